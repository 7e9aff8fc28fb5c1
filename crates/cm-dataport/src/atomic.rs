//! Atomic read-modify-write.
//!
//! Every atomic entry point (scattered, legacy DWord, typed) validates the opcode against the
//! element type and the configured opcode set up front, then runs the same per-lane loop:
//! load old, compute new with [`AtomicOp::apply`], store, hand old back to the caller.
//!
//! The loop runs under the surface's write lock, so two atomics on the same surface never
//! interleave.

use std::fmt;

use cm_surface::SurfaceId;

use crate::attrib::LaneMask;
use crate::context::{require_lanes, require_simd_width, volatile_view, EmuContext};
use crate::element::{load, store, Element, ElementClass};
use crate::error::{DataportError, Result};
use crate::stats::LaneTally;

/// SIMD widths accepted by [`EmuContext::write_atomic`].
pub const ATOMIC_SIMD_WIDTHS: &[usize] = &[1, 2, 4, 8, 16, 32];

/// Lane count of the legacy DWord atomic message.
pub const DWORD_ATOMIC_LANES: usize = 8;

/// Atomic opcode, numbered as in the hardware message descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AtomicOp {
    Add = 0x0,
    Sub = 0x1,
    Inc = 0x2,
    Dec = 0x3,
    Min = 0x4,
    Max = 0x5,
    Xchg = 0x6,
    CmpXchg = 0x7,
    And = 0x8,
    Or = 0x9,
    Xor = 0xa,
    MinSint = 0xb,
    MaxSint = 0xc,
    FAdd = 0xd,
    FSub = 0xe,
    FCmpWr = 0xf,
    FMin = 0x10,
    FMax = 0x11,
}

impl AtomicOp {
    pub const ALL: [AtomicOp; 18] = [
        AtomicOp::Add,
        AtomicOp::Sub,
        AtomicOp::Inc,
        AtomicOp::Dec,
        AtomicOp::Min,
        AtomicOp::Max,
        AtomicOp::Xchg,
        AtomicOp::CmpXchg,
        AtomicOp::And,
        AtomicOp::Or,
        AtomicOp::Xor,
        AtomicOp::MinSint,
        AtomicOp::MaxSint,
        AtomicOp::FAdd,
        AtomicOp::FSub,
        AtomicOp::FCmpWr,
        AtomicOp::FMin,
        AtomicOp::FMax,
    ];

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn from_raw(raw: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.raw() == raw)
            .ok_or(DataportError::UnknownOpcode { raw })
    }

    /// Decodes a mnemonic such as `cmpxchg` or `FADD`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            AtomicOp::Add => "ADD",
            AtomicOp::Sub => "SUB",
            AtomicOp::Inc => "INC",
            AtomicOp::Dec => "DEC",
            AtomicOp::Min => "MIN",
            AtomicOp::Max => "MAX",
            AtomicOp::Xchg => "XCHG",
            AtomicOp::CmpXchg => "CMPXCHG",
            AtomicOp::And => "AND",
            AtomicOp::Or => "OR",
            AtomicOp::Xor => "XOR",
            AtomicOp::MinSint => "MINSINT",
            AtomicOp::MaxSint => "MAXSINT",
            AtomicOp::FAdd => "FADD",
            AtomicOp::FSub => "FSUB",
            AtomicOp::FCmpWr => "FCMPWR",
            AtomicOp::FMin => "FMIN",
            AtomicOp::FMax => "FMAX",
        }
    }

    /// Number of source vectors consumed.
    pub fn operands(self) -> usize {
        match self {
            AtomicOp::Inc | AtomicOp::Dec => 0,
            AtomicOp::CmpXchg | AtomicOp::FCmpWr => 2,
            _ => 1,
        }
    }

    /// Length of the packed source vector of the legacy DWord message: the compare operand is
    /// appended after the eight source lanes.
    pub fn legacy_src_len(self) -> usize {
        if self.operands() == 2 {
            2 * DWORD_ATOMIC_LANES
        } else {
            DWORD_ATOMIC_LANES
        }
    }

    pub fn is_float_op(self) -> bool {
        matches!(
            self,
            AtomicOp::FAdd | AtomicOp::FSub | AtomicOp::FCmpWr | AtomicOp::FMin | AtomicOp::FMax
        )
    }

    /// Whether this opcode is defined for `T`.
    ///
    /// `XCHG` moves raw bits and `ADD`/`SUB`/`INC`/`DEC` are plain arithmetic, so they work for any
    /// element. Bitwise ops are limited to 32-bit integers, the float ops to float elements and
    /// the compare-and-select ops to integers.
    pub fn supports<T: Element>(self) -> bool {
        match self {
            AtomicOp::Xchg | AtomicOp::Add | AtomicOp::Sub | AtomicOp::Inc | AtomicOp::Dec => true,
            AtomicOp::And | AtomicOp::Or | AtomicOp::Xor => T::is_integer() && T::SIZE == 4,
            op if op.is_float_op() => T::CLASS == ElementClass::Float,
            _ => T::is_integer(),
        }
    }

    pub(crate) fn check_element<T: Element>(self) -> Result<()> {
        if !self.supports::<T>() {
            return Err(DataportError::UnsupportedOpcodeForType {
                op: self,
                element: T::NAME,
            });
        }
        Ok(())
    }

    /// New value stored by this opcode. Checks that the opcode is defined for `T`.
    pub fn compute<T: Element>(self, old: T, src0: T, src1: T) -> Result<T> {
        self.check_element::<T>()?;
        Ok(self.apply(old, src0, src1))
    }

    /// New value stored by this opcode, for an element type already checked with
    /// [`AtomicOp::supports`]. `src1` is only read by the compare-and-write opcodes.
    pub(crate) fn apply<T: Element>(self, old: T, src0: T, src1: T) -> T {
        match self {
            AtomicOp::Xchg => src0,
            AtomicOp::Add | AtomicOp::Sub | AtomicOp::Inc | AtomicOp::Dec if !T::is_integer() => {
                match self {
                    AtomicOp::Add => float_rmw(old, src0, |a, b| a + b),
                    AtomicOp::Sub => float_rmw(old, src0, |a, b| a - b),
                    AtomicOp::Inc => float_rmw(old, src0, |a, _| a + 1.0),
                    _ => float_rmw(old, src0, |a, _| a - 1.0),
                }
            }
            AtomicOp::Add => int_rmw(old, src0, |a, b, _| a.wrapping_add(b)),
            AtomicOp::Sub => int_rmw(old, src0, |a, b, _| a.wrapping_sub(b)),
            AtomicOp::Inc => int_rmw(old, src0, |a, _, _| a.wrapping_add(1)),
            AtomicOp::Dec => int_rmw(old, src0, |a, _, _| a.wrapping_sub(1)),
            AtomicOp::Min => int_rmw(old, src0, |a, b, _| a.min(b)),
            AtomicOp::Max => int_rmw(old, src0, |a, b, _| a.max(b)),
            AtomicOp::MinSint => int_rmw(old, src0, |a, b, bits| {
                if sign_extend(a, bits) <= sign_extend(b, bits) {
                    a
                } else {
                    b
                }
            }),
            AtomicOp::MaxSint => int_rmw(old, src0, |a, b, bits| {
                if sign_extend(a, bits) >= sign_extend(b, bits) {
                    a
                } else {
                    b
                }
            }),
            AtomicOp::CmpXchg => {
                if old.to_raw_bits() == src1.to_raw_bits() {
                    src0
                } else {
                    old
                }
            }
            AtomicOp::And => int_rmw(old, src0, |a, b, _| a & b),
            AtomicOp::Or => int_rmw(old, src0, |a, b, _| a | b),
            AtomicOp::Xor => int_rmw(old, src0, |a, b, _| a ^ b),
            AtomicOp::FAdd => float_rmw(old, src0, |a, b| a + b),
            AtomicOp::FSub => float_rmw(old, src0, |a, b| a - b),
            AtomicOp::FMin => float_rmw(old, src0, f64::min),
            AtomicOp::FMax => float_rmw(old, src0, f64::max),
            AtomicOp::FCmpWr => {
                if to_f64(old) == to_f64(src1) {
                    src0
                } else {
                    old
                }
            }
        }
    }
}

impl fmt::Display for AtomicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn int_rmw<T: Element>(old: T, src: T, op: impl FnOnce(u64, u64, u32) -> u64) -> T {
    let bits = (T::SIZE * 8) as u32;
    T::from_raw_bits(op(old.to_raw_bits(), src.to_raw_bits(), bits))
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// f32 arithmetic done in f64 rounds to the same f32 result for add, sub, min and max.
fn float_rmw<T: Element>(old: T, src: T, op: impl FnOnce(f64, f64) -> f64) -> T {
    from_f64(op(to_f64(old), to_f64(src)))
}

fn to_f64<T: Element>(value: T) -> f64 {
    let bits = value.to_raw_bits();
    if T::SIZE == 4 {
        f64::from(f32::from_bits(bits as u32))
    } else {
        f64::from_bits(bits)
    }
}

fn from_f64<T: Element>(value: f64) -> T {
    if T::SIZE == 4 {
        T::from_raw_bits(u64::from((value as f32).to_bits()))
    } else {
        T::from_raw_bits(value.to_bits())
    }
}

/// Source vectors of an atomic call.
#[derive(Clone, Copy, Debug)]
pub struct AtomicOperands<'a, T> {
    pub src0: Option<&'a [T]>,
    /// Compare value of `CMPXCHG` / `FCMPWR`.
    pub src1: Option<&'a [T]>,
}

impl<'a, T> AtomicOperands<'a, T> {
    /// For `INC` / `DEC`.
    pub fn none() -> Self {
        Self {
            src0: None,
            src1: None,
        }
    }

    pub fn one(src0: &'a [T]) -> Self {
        Self {
            src0: Some(src0),
            src1: None,
        }
    }

    pub fn two(src0: &'a [T], src1: &'a [T]) -> Self {
        Self {
            src0: Some(src0),
            src1: Some(src1),
        }
    }
}

impl<T> Default for AtomicOperands<'_, T> {
    fn default() -> Self {
        Self::none()
    }
}

/// Checks opcode, element type and operand shapes of an atomic call with `lanes` lanes.
pub(crate) fn validate_atomic<T: Element>(
    ctx: &EmuContext,
    call: &'static str,
    op: AtomicOp,
    lanes: usize,
    operands: &AtomicOperands<'_, T>,
    old: Option<&[T]>,
) -> Result<()> {
    let ceiling = ctx.config().atomic_ops.ceiling();
    if !ctx.config().atomic_ops.supports(op) {
        return Err(DataportError::OpcodeNotSupported { op, ceiling });
    }
    op.check_element::<T>()?;

    let needed = [("src0", operands.src0), ("src1", operands.src1)];
    for (operand, values) in needed.into_iter().take(op.operands()) {
        let values = values.ok_or(DataportError::MissingOperand { op, operand })?;
        require_lanes(call, operand, lanes, values.len())?;
    }
    if let Some(old) = old {
        require_lanes(call, "old", lanes, old.len())?;
    }
    Ok(())
}

/// Runs the read-modify-write loop over `lanes` lanes of `bytes`.
///
/// `position(i)` yields the byte offset of lane `i`, or `None` when that lane is out of bounds.
/// Out-of-bounds and masked lanes leave both memory and `old[i]` untouched.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_atomic_lanes<T: Element>(
    op: AtomicOp,
    bytes: &mut [u8],
    lanes: usize,
    position: impl Fn(usize) -> Option<u64>,
    mask: LaneMask<'_>,
    operands: &AtomicOperands<'_, T>,
    mut old: Option<&mut [T]>,
) -> LaneTally {
    let operand = |values: Option<&[T]>, lane: usize| {
        values
            .and_then(|v| v.get(lane))
            .copied()
            .unwrap_or_default()
    };

    let mut tally = LaneTally::default();
    for lane in 0..lanes {
        if !mask.enabled(lane) {
            tally.masked();
            continue;
        }
        let Some(pos) = position(lane) else {
            tally.out_of_bounds();
            continue;
        };
        let Some(prev) = load::<T>(bytes, pos) else {
            tally.out_of_bounds();
            continue;
        };
        let next = op.apply(prev, operand(operands.src0, lane), operand(operands.src1, lane));
        store(bytes, pos, next);
        if let Some(slot) = old.as_deref_mut().and_then(|old| old.get_mut(lane)) {
            *slot = prev;
        }
        tally.executed();
    }
    tally
}

/// Byte position of element `index` if a whole `T` there fits below `extent`.
fn element_position<T: Element>(index: u64, extent: u64) -> Option<u64> {
    let pos = index.checked_mul(T::SIZE as u64)?;
    (pos.checked_add(T::SIZE as u64)? <= extent).then_some(pos)
}

impl EmuContext {
    /// Scattered atomic on an input/output surface. Lane `i` addresses element
    /// `element_offsets[i]`, i.e. byte `element_offsets[i] * size_of::<T>()`.
    ///
    /// Pre-update values are written to `old` when given. Lanes disabled by `mask` or addressing
    /// past `width * height` bytes are skipped.
    pub fn write_atomic<T: Element>(
        &self,
        op: AtomicOp,
        id: SurfaceId,
        element_offsets: &[u32],
        operands: AtomicOperands<'_, T>,
        mask: LaneMask<'_>,
        old: Option<&mut [T]>,
    ) -> Result<()> {
        const OP: &str = "write_atomic";
        self.dispatch(OP, Some(id), || {
            let lanes = element_offsets.len();
            require_simd_width(OP, lanes, ATOMIC_SIMD_WIDTHS)?;
            mask.check_len(OP, lanes)?;
            validate_atomic(self, OP, op, lanes, &operands, old.as_deref())?;

            let desc = self.resolve(id, OP)?;
            let view = volatile_view(&desc, OP)?;
            let extent = desc.extent();

            let mut bytes = view.write();
            let tally = run_atomic_lanes(
                op,
                &mut bytes,
                lanes,
                |lane| element_position::<T>(u64::from(element_offsets[lane]), extent),
                mask,
                &operands,
                old,
            );
            drop(bytes);

            self.stats().inc_atomics();
            self.finish(tally);
            Ok(())
        })
    }

    /// The legacy eight-lane DWord atomic message.
    ///
    /// Lane `i` addresses byte `(global_offset + element_offsets[i]) * 4`. `src` carries eight
    /// source lanes, followed by eight compare lanes for `CMPXCHG` / `FCMPWR`; `INC` and `DEC`
    /// still take eight (ignored) lanes.
    pub fn write_atomic_dword<T: Element>(
        &self,
        op: AtomicOp,
        id: SurfaceId,
        global_offset: u32,
        element_offsets: &[u32],
        src: &[T],
        old: Option<&mut [T]>,
    ) -> Result<()> {
        const OP: &str = "write_atomic_dword";
        self.dispatch(OP, Some(id), || {
            require_lanes(OP, "element_offsets", DWORD_ATOMIC_LANES, element_offsets.len())?;
            require_lanes(OP, "src", op.legacy_src_len(), src.len())?;
            let operands = if op.operands() == 2 {
                let (src0, src1) = src.split_at(DWORD_ATOMIC_LANES);
                AtomicOperands::two(src0, src1)
            } else {
                AtomicOperands::one(src)
            };
            validate_atomic(self, OP, op, DWORD_ATOMIC_LANES, &operands, old.as_deref())?;

            let desc = self.resolve(id, OP)?;
            let view = volatile_view(&desc, OP)?;
            if T::SIZE != 4 {
                return Err(DataportError::ElementSizeMismatch {
                    id,
                    op: OP,
                    format: desc.format(),
                    element_size: T::SIZE,
                    expected: 4,
                });
            }
            let extent = desc.extent();

            let mut bytes = view.write();
            let tally = run_atomic_lanes(
                op,
                &mut bytes,
                DWORD_ATOMIC_LANES,
                |lane| {
                    let index = u64::from(global_offset) + u64::from(element_offsets[lane]);
                    element_position::<T>(index, extent)
                },
                LaneMask::All,
                &operands,
                old,
            );
            drop(bytes);

            self.stats().inc_atomics();
            self.finish(tally);
            Ok(())
        })
    }
}
