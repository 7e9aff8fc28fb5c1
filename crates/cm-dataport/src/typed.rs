//! Coordinate-addressed image access (typed) and channel-masked buffer access (untyped).
//!
//! Channel data is laid out channel-major: with `n` lanes, enabled channel `k` (counting only
//! enabled channels, in R, G, B, A order) occupies `data[k * n..(k + 1) * n]`.

use cm_surface::{SurfaceDescriptor, SurfaceFormat, SurfaceId};

use crate::atomic::{run_atomic_lanes, validate_atomic, AtomicOp, AtomicOperands};
use crate::attrib::{ChannelMask, LaneMask};
use crate::config::OobWritePolicy;
use crate::context::{
    require_lanes, require_simd_width, resource_read_view, resource_write_view, volatile_view, EmuContext,
};
use crate::element::{load, store, Element};
use crate::error::{DataportError, Result};
use crate::stats::LaneTally;

/// Lane counts of typed and untyped messages.
pub const TYPED_SIMD_WIDTHS: &[usize] = &[8, 16];

/// Per-lane coordinates of a typed access. `v` and `r` are absent for surfaces without that
/// dimension and count as 0.
#[derive(Clone, Copy, Debug)]
pub struct TypedCoords<'a> {
    pub u: &'a [u32],
    pub v: Option<&'a [u32]>,
    pub r: Option<&'a [u32]>,
}

impl<'a> TypedCoords<'a> {
    pub fn linear(u: &'a [u32]) -> Self {
        Self { u, v: None, r: None }
    }

    pub fn planar(u: &'a [u32], v: &'a [u32]) -> Self {
        Self { u, v: Some(v), r: None }
    }

    pub fn volume(u: &'a [u32], v: &'a [u32], r: &'a [u32]) -> Self {
        Self {
            u,
            v: Some(v),
            r: Some(r),
        }
    }

    pub fn lanes(&self) -> usize {
        self.u.len()
    }

    fn check(&self, op: &'static str) -> Result<()> {
        require_simd_width(op, self.lanes(), TYPED_SIMD_WIDTHS)?;
        if let Some(v) = self.v {
            require_lanes(op, "v", self.lanes(), v.len())?;
        }
        if let Some(r) = self.r {
            require_lanes(op, "r", self.lanes(), r.len())?;
        }
        Ok(())
    }

    fn at(&self, lane: usize) -> (u64, u64, u64) {
        let get = |coords: Option<&[u32]>| coords.and_then(|c| c.get(lane)).copied().unwrap_or(0);
        (u64::from(self.u[lane]), u64::from(get(self.v)), u64::from(get(self.r)))
    }
}

/// Byte layout of a typed surface.
#[derive(Clone, Copy, Debug)]
struct TypedLayout {
    /// Bytes between horizontally adjacent pixels.
    pixel: u64,
    /// Bytes between adjacent channels of one pixel.
    channel: u64,
    row_bytes: u64,
    row_pitch: u64,
    height: u64,
    depth: u64,
}

impl TypedLayout {
    fn new(desc: &SurfaceDescriptor, op: &'static str, formats: &[SurfaceFormat]) -> Result<Self> {
        let format = desc.format();
        if !formats.contains(&format) {
            return Err(DataportError::UnsupportedFormat {
                id: desc.id(),
                op,
                format,
            });
        }
        let channel = match format {
            SurfaceFormat::R8G8B8A8Uint => 1,
            _ => 4,
        };
        Ok(Self {
            pixel: 4,
            channel,
            row_bytes: u64::from(desc.width()),
            row_pitch: desc.row_pitch(),
            height: u64::from(desc.height()),
            depth: u64::from(desc.depth()),
        })
    }

    fn require_element<T: Element>(&self, desc: &SurfaceDescriptor, op: &'static str) -> Result<()> {
        if T::SIZE as u64 != self.channel {
            return Err(DataportError::ElementSizeMismatch {
                id: desc.id(),
                op,
                format: desc.format(),
                element_size: T::SIZE,
                expected: self.channel as usize,
            });
        }
        Ok(())
    }

    /// Byte offset of `channel` of pixel `(u, v, r)`, or `None` if it lies outside the surface.
    fn position(&self, (u, v, r): (u64, u64, u64), channel: u32) -> Option<u64> {
        if v >= self.height || r >= self.depth {
            return None;
        }
        let x = u
            .checked_mul(self.pixel)?
            .checked_add(u64::from(channel) * self.channel)?;
        if x.checked_add(self.channel)? > self.row_bytes {
            return None;
        }
        let row = r.checked_mul(self.height)?.checked_add(v)?;
        row.checked_mul(self.row_pitch)?.checked_add(x)
    }
}

const TYPED_FORMATS: &[SurfaceFormat] = &[
    SurfaceFormat::R32Sint,
    SurfaceFormat::R32Uint,
    SurfaceFormat::R32Float,
    SurfaceFormat::R8G8B8A8Uint,
];

const TYPED_ATOMIC_FORMATS: &[SurfaceFormat] = &[
    SurfaceFormat::R32Sint,
    SurfaceFormat::R32Uint,
    SurfaceFormat::R32Float,
];

fn check_channels(op: &'static str, channels: ChannelMask, lanes: usize, data_len: usize) -> Result<()> {
    if channels.is_empty() {
        return Err(DataportError::EmptyChannelMask { op });
    }
    require_lanes(op, "data", channels.count() * lanes, data_len)
}

impl EmuContext {
    /// Reads the enabled channels of one pixel per lane. Lanes outside the surface read 0.
    pub fn read_typed<T: Element>(
        &self,
        id: SurfaceId,
        channels: ChannelMask,
        coords: TypedCoords<'_>,
        dst: &mut [T],
    ) -> Result<()> {
        const OP: &str = "read_typed";
        self.dispatch(OP, Some(id), || {
            coords.check(OP)?;
            check_channels(OP, channels, coords.lanes(), dst.len())?;
            let desc = self.resolve(id, OP)?;
            let view = resource_read_view(&desc, OP)?;
            let layout = TypedLayout::new(&desc, OP, TYPED_FORMATS)?;
            layout.require_element::<T>(&desc, OP)?;

            let lanes = coords.lanes();
            let mut tally = LaneTally::default();
            let bytes = view.read();
            for (k, channel) in channels.positions().enumerate() {
                for lane in 0..lanes {
                    let value = layout
                        .position(coords.at(lane), channel)
                        .and_then(|pos| load::<T>(&bytes, pos));
                    match value {
                        Some(value) => {
                            dst[k * lanes + lane] = value;
                            tally.executed();
                        }
                        None => {
                            dst[k * lanes + lane] = T::zeroed();
                            tally.out_of_bounds();
                        }
                    }
                }
            }
            drop(bytes);

            self.stats().inc_reads();
            self.finish(tally);
            Ok(())
        })
    }

    /// Writes the enabled channels of one pixel per lane. Lanes outside the surface are
    /// dropped; under [`OobWritePolicy::StopAtFirst`] so are the later lanes of that channel.
    pub fn write_typed<T: Element>(
        &self,
        id: SurfaceId,
        channels: ChannelMask,
        coords: TypedCoords<'_>,
        src: &[T],
    ) -> Result<()> {
        const OP: &str = "write_typed";
        self.dispatch(OP, Some(id), || {
            coords.check(OP)?;
            check_channels(OP, channels, coords.lanes(), src.len())?;
            let desc = self.resolve(id, OP)?;
            let view = resource_write_view(&desc, OP)?;
            let layout = TypedLayout::new(&desc, OP, TYPED_FORMATS)?;
            layout.require_element::<T>(&desc, OP)?;

            let lanes = coords.lanes();
            let mut bytes = view.write();
            let tally = self.write_channels(&mut bytes, channels, lanes, src, |lane, channel| {
                layout.position(coords.at(lane), channel)
            });
            drop(bytes);

            self.stats().inc_writes();
            self.finish(tally);
            Ok(())
        })
    }

    /// Atomic on one R32 pixel per lane. `lod` is accepted for shape compatibility and ignored,
    /// as only mip level 0 is emulated.
    #[allow(clippy::too_many_arguments)]
    pub fn write_typed_atomic<T: Element>(
        &self,
        op: AtomicOp,
        id: SurfaceId,
        coords: TypedCoords<'_>,
        lod: Option<&[u32]>,
        operands: AtomicOperands<'_, T>,
        mask: LaneMask<'_>,
        old: Option<&mut [T]>,
    ) -> Result<()> {
        const OP: &str = "write_typed_atomic";
        self.dispatch(OP, Some(id), || {
            coords.check(OP)?;
            let lanes = coords.lanes();
            if let Some(lod) = lod {
                require_lanes(OP, "lod", lanes, lod.len())?;
            }
            mask.check_len(OP, lanes)?;
            validate_atomic(self, OP, op, lanes, &operands, old.as_deref())?;

            let desc = self.resolve(id, OP)?;
            let view = volatile_view(&desc, OP)?;
            let layout = TypedLayout::new(&desc, OP, TYPED_ATOMIC_FORMATS)?;
            layout.require_element::<T>(&desc, OP)?;

            let mut bytes = view.write();
            let tally = run_atomic_lanes(
                op,
                &mut bytes,
                lanes,
                |lane| layout.position(coords.at(lane), 0),
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

    /// Untyped buffer read: channel `c` of lane `i` is element `u[i] + c`. Lanes past
    /// `width * height` bytes read 0.
    pub fn read_untyped<T: Element>(
        &self,
        id: SurfaceId,
        channels: ChannelMask,
        u: &[u32],
        dst: &mut [T],
    ) -> Result<()> {
        const OP: &str = "read_untyped";
        self.dispatch(OP, Some(id), || {
            require_simd_width(OP, u.len(), TYPED_SIMD_WIDTHS)?;
            check_channels(OP, channels, u.len(), dst.len())?;
            let desc = self.resolve(id, OP)?;
            let view = resource_read_view(&desc, OP)?;
            let extent = desc.extent();

            let lanes = u.len();
            let mut tally = LaneTally::default();
            let bytes = view.read();
            for (k, channel) in channels.positions().enumerate() {
                for (lane, &index) in u.iter().enumerate() {
                    let value = untyped_position::<T>(index, channel, extent).and_then(|pos| load::<T>(&bytes, pos));
                    dst[k * lanes + lane] = value.unwrap_or_else(T::zeroed);
                    if value.is_some() {
                        tally.executed();
                    } else {
                        tally.out_of_bounds();
                    }
                }
            }
            drop(bytes);

            self.stats().inc_reads();
            self.finish(tally);
            Ok(())
        })
    }

    /// Untyped buffer write, addressed like [`EmuContext::read_untyped`].
    pub fn write_untyped<T: Element>(
        &self,
        id: SurfaceId,
        channels: ChannelMask,
        u: &[u32],
        src: &[T],
    ) -> Result<()> {
        const OP: &str = "write_untyped";
        self.dispatch(OP, Some(id), || {
            require_simd_width(OP, u.len(), TYPED_SIMD_WIDTHS)?;
            check_channels(OP, channels, u.len(), src.len())?;
            let desc = self.resolve(id, OP)?;
            let view = resource_write_view(&desc, OP)?;
            let extent = desc.extent();

            let mut bytes = view.write();
            let tally = self.write_channels(&mut bytes, channels, u.len(), src, |lane, channel| {
                untyped_position::<T>(u[lane], channel, extent)
            });
            drop(bytes);

            self.stats().inc_writes();
            self.finish(tally);
            Ok(())
        })
    }

    fn write_channels<T: Element>(
        &self,
        bytes: &mut [u8],
        channels: ChannelMask,
        lanes: usize,
        src: &[T],
        position: impl Fn(usize, u32) -> Option<u64>,
    ) -> LaneTally {
        let stop_at_first = self.config().oob_write == OobWritePolicy::StopAtFirst;
        let mut tally = LaneTally::default();
        for (k, channel) in channels.positions().enumerate() {
            for lane in 0..lanes {
                let stored = position(lane, channel).is_some_and(|pos| store(bytes, pos, src[k * lanes + lane]));
                if stored {
                    tally.executed();
                } else if stop_at_first {
                    tally.out_of_bounds += (lanes - lane) as u64;
                    break;
                } else {
                    tally.out_of_bounds();
                }
            }
        }
        tally
    }
}

fn untyped_position<T: Element>(index: u32, channel: u32, extent: u64) -> Option<u64> {
    let pos = (u64::from(index) + u64::from(channel)) * T::SIZE as u64;
    (pos + T::SIZE as u64 <= extent).then_some(pos)
}

#[cfg(test)]
mod tests {
    use cm_surface::{BufferKind, Registration, SurfaceMemory};

    use super::*;
    use crate::config::DataportConfig;

    const ID: SurfaceId = SurfaceId::new(4);

    /// 4x2 R32_UINT image holding `10 * row + col`.
    fn image(kind: BufferKind, format: SurfaceFormat) -> (EmuContext, SurfaceMemory) {
        let ctx = EmuContext::default();
        let bytes: Vec<u8> = (0..2u32)
            .flat_map(|row| (0..4u32).map(move |col| 10 * row + col))
            .flat_map(u32::to_ne_bytes)
            .collect();
        let memory = SurfaceMemory::from_bytes(bytes);
        ctx.register(Registration::surface_2d(ID, kind, memory.clone(), 16, 2, format))
            .unwrap();
        (ctx, memory)
    }

    #[test]
    fn typed_read_single_channel() {
        let (ctx, _) = image(BufferKind::Input, SurfaceFormat::R32Uint);
        let u = [0, 1, 2, 3, 3, 4, 0, 1];
        let v = [0, 0, 1, 1, 2, 0, 1, 0];
        let mut out = [9u32; 8];
        ctx.read_typed(ID, ChannelMask::R, TypedCoords::planar(&u, &v), &mut out)
            .unwrap();
        // Lane 4 is below the last row, lane 5 right of the last column.
        assert_eq!(out, [0, 1, 12, 13, 0, 0, 10, 1]);
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 2);
    }

    #[test]
    fn typed_volume_coordinates_select_slices() {
        // 4x2x2 R32_UINT volume holding `100 + index`.
        let ctx = EmuContext::default();
        let bytes: Vec<u8> = (0..16u32).map(|i| 100 + i).flat_map(u32::to_ne_bytes).collect();
        let memory = SurfaceMemory::from_bytes(bytes);
        ctx.register(
            Registration::surface_2d(ID, BufferKind::InputOutput, memory.clone(), 16, 2, SurfaceFormat::R32Uint)
                .with_depth(2),
        )
        .unwrap();

        let u = [0, 1, 2, 3, 0, 3, 0, 0];
        let v = [0, 0, 1, 1, 1, 0, 2, 0];
        let r = [0, 0, 0, 1, 1, 1, 0, 2];
        let coords = TypedCoords::volume(&u, &v, &r);
        let mut out = [9u32; 8];
        ctx.read_typed(ID, ChannelMask::R, coords, &mut out).unwrap();
        // Lane 6 is below the last row, lane 7 past the last slice.
        assert_eq!(out, [100, 101, 106, 115, 112, 111, 0, 0]);

        ctx.write_typed(ID, ChannelMask::R, coords, &[1u32, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();
        let words: Vec<u32> = memory
            .to_vec()
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(words[6], 3);
        assert_eq!(words[11], 6);
        assert_eq!(words[12], 5);
        assert_eq!(words[15], 4);
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 4);
    }

    #[test]
    fn typed_channels_are_channel_major() {
        let (ctx, memory) = image(BufferKind::InputOutput, SurfaceFormat::R8G8B8A8Uint);
        let u = [0, 1, 2, 3, 0, 1, 2, 3];
        let v = [0, 0, 0, 0, 1, 1, 1, 1];
        let coords = TypedCoords::planar(&u, &v);
        let src: Vec<u8> = (0..16).collect();
        ctx.write_typed(ID, ChannelMask::R | ChannelMask::A, coords, &src)
            .unwrap();

        let bytes = memory.to_vec();
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[3], 8);
        assert_eq!(bytes[4 * 4 + 3], 12);

        let mut out = [0u8; 16];
        ctx.read_typed(ID, ChannelMask::R | ChannelMask::A, coords, &mut out)
            .unwrap();
        assert_eq!(out.to_vec(), src);
    }

    #[test]
    fn typed_rejects_unsupported_format_and_element() {
        let (ctx, _) = image(BufferKind::Input, SurfaceFormat::R16Uint);
        let u = [0; 8];
        let mut out = [0u32; 8];
        let err = ctx
            .read_typed(ID, ChannelMask::R, TypedCoords::linear(&u), &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::UnsupportedFormat { format: SurfaceFormat::R16Uint, .. }));

        let (ctx, _) = image(BufferKind::Input, SurfaceFormat::R32Float);
        let mut out = [0u16; 8];
        let err = ctx
            .read_typed(ID, ChannelMask::R, TypedCoords::linear(&u), &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::ElementSizeMismatch { element_size: 2, expected: 4, .. }));

        let mut out = [0f32; 8];
        let err = ctx
            .read_typed(ID, ChannelMask::empty(), TypedCoords::linear(&u), &mut out)
            .unwrap_err();
        assert_eq!(err, DataportError::EmptyChannelMask { op: "read_typed" });
    }

    #[test]
    fn typed_atomic_addresses_pixels() {
        let (ctx, memory) = image(BufferKind::InputOutput, SurfaceFormat::R32Uint);
        let u = [0, 1, 3, 7, 0, 0, 0, 0];
        let v = [1, 1, 0, 0, 0, 0, 0, 0];
        let mask = [true, true, true, true, false, false, false, false];
        let mut old = [0u32; 8];
        ctx.write_typed_atomic(
            AtomicOp::Add,
            ID,
            TypedCoords::planar(&u, &v),
            Some(&[0; 8]),
            AtomicOperands::one(&[100; 8]),
            LaneMask::from(&mask[..]),
            Some(&mut old[..]),
        )
        .unwrap();
        assert_eq!(&old[..4], &[10, 11, 3, 0]);
        let bytes = memory.to_vec();
        let word = |i: usize| u32::from_ne_bytes([bytes[4 * i], bytes[4 * i + 1], bytes[4 * i + 2], bytes[4 * i + 3]]);
        assert_eq!(word(3), 103);
        assert_eq!(word(4), 110);
        assert_eq!(word(5), 111);
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 1);
    }

    #[test]
    fn typed_atomic_rejects_rgba8() {
        let (ctx, _) = image(BufferKind::InputOutput, SurfaceFormat::R8G8B8A8Uint);
        let u = [0; 8];
        let err = ctx
            .write_typed_atomic(
                AtomicOp::Inc,
                ID,
                TypedCoords::linear(&u),
                None,
                AtomicOperands::<u32>::none(),
                LaneMask::All,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, DataportError::UnsupportedFormat { .. }));
    }

    #[test]
    fn untyped_round_trip_and_bounds() {
        let ctx = EmuContext::default();
        let memory = SurfaceMemory::zeroed(64);
        ctx.register(Registration::buffer(ID, BufferKind::Buffer, memory.clone(), 40))
            .unwrap();

        let u = [0, 2, 4, 6, 8, 9, 12, 1];
        let src: Vec<u32> = (1..=16).collect();
        ctx.write_untyped(ID, ChannelMask::RG, &u, &src).unwrap();
        // Lanes 6 (elements 12, 13) and 5 channel G (element 10) are past 40 bytes.
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 3);

        let mut out = [0u32; 8];
        ctx.read_untyped(ID, ChannelMask::G, &[0, 1, 2, 3, 8, 9, 10, 11], &mut out)
            .unwrap();
        // G is written after R, so it wins where lanes overlap (elements 1, 2 and 9).
        assert_eq!(out, [9, 16, 10, 3, 13, 0, 0, 0]);
    }

    #[test]
    fn untyped_stop_policy() {
        let ctx = EmuContext::new(DataportConfig {
            oob_write: OobWritePolicy::StopAtFirst,
            ..DataportConfig::default()
        });
        let memory = SurfaceMemory::zeroed(16);
        ctx.register(Registration::buffer(ID, BufferKind::Output, memory.clone(), 16))
            .unwrap();
        ctx.write_untyped(ID, ChannelMask::R, &[0, 9, 1, 2, 3, 0, 0, 0], &[7u32; 8])
            .unwrap();
        let bytes = memory.to_vec();
        assert_eq!(&bytes[..4], 7u32.to_ne_bytes().as_slice());
        assert_eq!(&bytes[4..], &[0; 12]);
    }
}
