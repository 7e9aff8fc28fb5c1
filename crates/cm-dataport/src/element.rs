use std::fmt;

use bytemuck::Pod;

/// Numeric class of a SIMD element, which decides how atomics interpret its bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementClass {
    Unsigned,
    Signed,
    Float,
}

/// Scalar type that kernels move through the dataport.
///
/// Values are stored in host byte order, exactly as a `T*` store into the backing buffer would.
pub trait Element: Pod + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const CLASS: ElementClass;
    const NAME: &'static str;
    const SIZE: usize = std::mem::size_of::<Self>();

    /// Bit pattern, zero-extended to 64 bits.
    fn to_raw_bits(self) -> u64;

    /// Inverse of [`Element::to_raw_bits`]; upper bits are discarded.
    fn from_raw_bits(bits: u64) -> Self;

    /// Numeric conversion with `as` semantics.
    fn from_u64_lossy(value: u64) -> Self;

    fn is_integer() -> bool {
        !matches!(Self::CLASS, ElementClass::Float)
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $u:ty, $class:ident;)*) => {
        $(
            impl Element for $t {
                const CLASS: ElementClass = ElementClass::$class;
                const NAME: &'static str = stringify!($t);

                fn to_raw_bits(self) -> u64 {
                    self as $u as u64
                }

                fn from_raw_bits(bits: u64) -> Self {
                    bits as $u as $t
                }

                fn from_u64_lossy(value: u64) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_int_element! {
    u8 => u8, Unsigned;
    u16 => u16, Unsigned;
    u32 => u32, Unsigned;
    u64 => u64, Unsigned;
    i8 => u8, Signed;
    i16 => u16, Signed;
    i32 => u32, Signed;
    i64 => u64, Signed;
}

impl Element for f32 {
    const CLASS: ElementClass = ElementClass::Float;
    const NAME: &'static str = "f32";

    fn to_raw_bits(self) -> u64 {
        u64::from(f32::to_bits(self))
    }

    fn from_raw_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }

    fn from_u64_lossy(value: u64) -> Self {
        value as f32
    }
}

impl Element for f64 {
    const CLASS: ElementClass = ElementClass::Float;
    const NAME: &'static str = "f64";

    fn to_raw_bits(self) -> u64 {
        f64::to_bits(self)
    }

    fn from_raw_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }

    fn from_u64_lossy(value: u64) -> Self {
        value as f64
    }
}

/// Loads a `T` at `offset`, or `None` if it does not fit in `bytes`.
pub(crate) fn load<T: Element>(bytes: &[u8], offset: u64) -> Option<T> {
    let range = byte_range::<T>(offset)?;
    bytes.get(range).map(bytemuck::pod_read_unaligned)
}

/// Stores `value` at `offset`. Returns false (and writes nothing) if it does not fit.
pub(crate) fn store<T: Element>(bytes: &mut [u8], offset: u64, value: T) -> bool {
    let Some(range) = byte_range::<T>(offset) else {
        return false;
    };
    match bytes.get_mut(range) {
        Some(dst) => {
            dst.copy_from_slice(bytemuck::bytes_of(&value));
            true
        }
        None => false,
    }
}

/// Loads a `T` at `offset`, taking only the bytes below `limit` and zero-filling the rest.
pub(crate) fn load_clipped<T: Element>(bytes: &[u8], offset: u64, limit: u64) -> T {
    let limit = limit.min(bytes.len() as u64);
    assemble(|k| {
        let pos = offset.saturating_add(k as u64);
        if pos < limit {
            bytes[pos as usize]
        } else {
            0
        }
    })
}

/// Builds a `T` byte by byte.
pub(crate) fn assemble<T: Element>(mut byte: impl FnMut(usize) -> u8) -> T {
    let mut value = T::zeroed();
    for (k, dst) in bytemuck::bytes_of_mut(&mut value).iter_mut().enumerate() {
        *dst = byte(k);
    }
    value
}

fn byte_range<T: Element>(offset: u64) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(T::SIZE)?;
    Some(start..end)
}
