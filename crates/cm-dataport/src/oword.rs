//! Linear OWord (16-byte) and HWord (32-byte) block messages.
//!
//! These address a single-row surface by byte offset. Reads zero-fill whatever lies past the
//! surface width; writes stop at the first element that does not fit.

use cm_surface::SurfaceId;

use crate::attrib::BufferAttrib;
use crate::context::{block_read_view, block_write_view, require_aligned, require_linear, EmuContext};
use crate::element::{load_clipped, store, Element};
use crate::error::{DataportError, Result};
use crate::stats::LaneTally;

const OWORD: u32 = 16;
const DWORD: u32 = 4;
const HWORD: u32 = 32;

/// Transfer sizes an HWord block message can carry.
pub const HWORD_BLOCK_SIZES: &[u64] = &[32, 64, 128, 256];

impl EmuContext {
    /// Reads `dst.len()` elements starting at byte `offset`.
    ///
    /// `offset` must be OWord aligned, or DWord aligned with a `*DwAligned` attribute.
    pub fn read_block_1d<T: Element>(
        &self,
        id: SurfaceId,
        attrib: BufferAttrib,
        offset: u32,
        dst: &mut [T],
    ) -> Result<()> {
        let align = if attrib.is_dw_aligned() { DWORD } else { OWORD };
        self.read_linear_block("read_block_1d", id, attrib, offset, align, None, dst)
    }

    /// Reads an HWord block: 32-byte aligned, 32 to 256 bytes long.
    pub fn read_block_hword<T: Element>(
        &self,
        id: SurfaceId,
        attrib: BufferAttrib,
        offset: u32,
        dst: &mut [T],
    ) -> Result<()> {
        self.read_linear_block("read_block_hword", id, attrib, offset, HWORD, Some(HWORD_BLOCK_SIZES), dst)
    }

    /// Writes `src` starting at byte `offset`. Both the offset and the transfer length must be
    /// OWord multiples.
    pub fn write_block_1d<T: Element>(&self, id: SurfaceId, offset: u32, src: &[T]) -> Result<()> {
        self.write_linear_block("write_block_1d", id, offset, HWordRule::OWord, src)
    }

    /// Writes an HWord block: 32-byte aligned, 32 to 256 bytes long.
    pub fn write_block_hword<T: Element>(&self, id: SurfaceId, offset: u32, src: &[T]) -> Result<()> {
        self.write_linear_block("write_block_hword", id, offset, HWordRule::HWord, src)
    }

    #[allow(clippy::too_many_arguments)]
    fn read_linear_block<T: Element>(
        &self,
        op: &'static str,
        id: SurfaceId,
        attrib: BufferAttrib,
        offset: u32,
        align: u32,
        sizes: Option<&'static [u64]>,
        dst: &mut [T],
    ) -> Result<()> {
        self.dispatch(op, Some(id), || {
            let desc = self.resolve(id, op)?;
            let view = block_read_view(&desc, attrib, op)?;
            require_aligned(id, op, i64::from(offset), align)?;
            if let Some(allowed) = sizes {
                require_block_size(id, op, transfer_bytes::<T>(dst.len()), allowed)?;
            }
            require_linear(&desc, op)?;

            let width = u64::from(desc.width());
            let mut lanes = LaneTally::default();
            let bytes = view.read();
            for (i, slot) in dst.iter_mut().enumerate() {
                let pos = u64::from(offset) + (i * T::SIZE) as u64;
                *slot = load_clipped(&bytes, pos, width);
                if pos + T::SIZE as u64 <= width {
                    lanes.executed();
                } else {
                    lanes.out_of_bounds();
                }
            }
            drop(bytes);

            self.stats().inc_reads();
            self.finish(lanes);
            Ok(())
        })
    }

    fn write_linear_block<T: Element>(
        &self,
        op: &'static str,
        id: SurfaceId,
        offset: u32,
        rule: HWordRule,
        src: &[T],
    ) -> Result<()> {
        self.dispatch(op, Some(id), || {
            let desc = self.resolve(id, op)?;
            let view = block_write_view(&desc, op)?;
            let total = transfer_bytes::<T>(src.len());
            match rule {
                HWordRule::OWord => {
                    require_aligned(id, op, i64::from(offset), OWORD)?;
                    if total % u64::from(OWORD) != 0 {
                        return Err(DataportError::MisalignedSize {
                            id,
                            op,
                            bytes: total,
                            required: OWORD,
                        });
                    }
                }
                HWordRule::HWord => {
                    require_aligned(id, op, i64::from(offset), HWORD)?;
                    require_block_size(id, op, total, HWORD_BLOCK_SIZES)?;
                }
            }

            let width = u64::from(desc.width());
            let mut lanes = LaneTally::default();
            let mut bytes = view.write();
            for (i, value) in src.iter().enumerate() {
                let pos = u64::from(offset) + (i * T::SIZE) as u64;
                if pos + T::SIZE as u64 > width || !store(&mut bytes, pos, *value) {
                    lanes.out_of_bounds += (src.len() - i) as u64;
                    break;
                }
                lanes.executed();
            }
            drop(bytes);

            self.stats().inc_writes();
            self.finish(lanes);
            Ok(())
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum HWordRule {
    OWord,
    HWord,
}

fn transfer_bytes<T: Element>(len: usize) -> u64 {
    (len * T::SIZE) as u64
}

fn require_block_size(id: SurfaceId, op: &'static str, bytes: u64, allowed: &'static [u64]) -> Result<()> {
    if !allowed.contains(&bytes) {
        return Err(DataportError::InvalidBlockSize {
            id,
            op,
            bytes,
            allowed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cm_surface::{BufferKind, Registration, SurfaceFormat, SurfaceMemory};

    use super::*;

    const ID: SurfaceId = SurfaceId::new(1);

    fn ctx_with_buffer(kind: BufferKind, width: u32) -> (EmuContext, SurfaceMemory) {
        let ctx = EmuContext::default();
        let memory = SurfaceMemory::zeroed(64);
        ctx.register(Registration::buffer(ID, kind, memory.clone(), width))
            .unwrap();
        (ctx, memory)
    }

    #[test]
    fn write_then_read_oword_block() {
        let (ctx, _) = ctx_with_buffer(BufferKind::InputOutput, 64);
        ctx.write_block_1d(ID, 16, &[1u32, 2, 3, 4]).unwrap();

        let mut out = [0u32; 8];
        ctx.read_block_1d(ID, BufferAttrib::None, 16, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn read_zero_fills_past_width() {
        let (ctx, memory) = ctx_with_buffer(BufferKind::Input, 40);
        memory.copy_in(0, &[0xAA; 64]);

        let mut out = [0u32; 4];
        ctx.read_block_1d(ID, BufferAttrib::None, 32, &mut out).unwrap();
        assert_eq!(out, [0xAAAA_AAAA, 0xAAAA_AAAA, 0, 0]);

        let mut out = [0u64; 2];
        ctx.read_block_1d(ID, BufferAttrib::DwAligned, 36, &mut out).unwrap();
        assert_eq!(out[0].to_ne_bytes(), [0xAA, 0xAA, 0xAA, 0xAA, 0, 0, 0, 0]);
        assert_eq!(out[1], 0);
    }

    #[test]
    fn read_alignment_depends_on_attribute() {
        let (ctx, _) = ctx_with_buffer(BufferKind::Input, 64);
        let mut out = [0u32; 4];
        let err = ctx
            .read_block_1d(ID, BufferAttrib::None, 4, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::MisalignedOffset { required: 16, .. }));
        ctx.read_block_1d(ID, BufferAttrib::DwAligned, 4, &mut out).unwrap();
        let err = ctx
            .read_block_1d(ID, BufferAttrib::DwAligned, 2, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::MisalignedOffset { required: 4, .. }));
    }

    #[test]
    fn read_requires_single_row_surface() {
        let ctx = EmuContext::default();
        ctx.register(Registration::surface_2d(
            ID,
            BufferKind::Input,
            SurfaceMemory::zeroed(64),
            16,
            4,
            SurfaceFormat::R32Uint,
        ))
        .unwrap();
        let mut out = [0u32; 4];
        let err = ctx
            .read_block_1d(ID, BufferAttrib::None, 0, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::InvalidSurfaceShape { height: 4, .. }));
    }

    #[test]
    fn misaligned_write_does_not_mutate() {
        let (ctx, memory) = ctx_with_buffer(BufferKind::InputOutput, 64);
        let err = ctx.write_block_1d(ID, 8, &[7u32; 4]).unwrap_err();
        assert!(matches!(err, DataportError::MisalignedOffset { offset: 8, required: 16, .. }));

        let err = ctx.write_block_1d(ID, 0, &[7u32; 3]).unwrap_err();
        assert!(matches!(err, DataportError::MisalignedSize { bytes: 12, .. }));

        assert_eq!(memory.to_vec(), vec![0; 64]);
        assert_eq!(ctx.stats().snapshot().rejected, 2);
    }

    #[test]
    fn write_stops_at_width() {
        let (ctx, memory) = ctx_with_buffer(BufferKind::Output, 40);
        ctx.write_block_1d(ID, 32, &[0x11u8; 16]).unwrap();
        let bytes = memory.to_vec();
        assert_eq!(&bytes[32..40], &[0x11; 8]);
        assert_eq!(&bytes[40..48], &[0; 8]);
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 8);
    }

    #[test]
    fn constant_reads_go_through_volatile_view() {
        let (ctx, _) = ctx_with_buffer(BufferKind::Input, 64);
        let mut out = [0u32; 4];
        let err = ctx
            .read_block_1d(ID, BufferAttrib::Constant, 0, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::InvalidSurfaceKind { kind: BufferKind::Input, .. }));
        let err = ctx
            .read_block_1d(ID, BufferAttrib::ConstantDwAligned, 4, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::InvalidSurfaceKind { .. }));

        let ctx = EmuContext::default();
        let volatile = SurfaceMemory::zeroed(64);
        volatile.copy_in(0, &[3; 16]);
        ctx.register(
            Registration::buffer(ID, BufferKind::InputOutput, SurfaceMemory::zeroed(64), 64)
                .with_volatile(volatile),
        )
        .unwrap();
        ctx.read_block_1d(ID, BufferAttrib::Constant, 0, &mut out).unwrap();
        assert_eq!(out, [0x0303_0303; 4]);
    }

    #[test]
    fn hword_write_stops_at_width() {
        let (ctx, memory) = ctx_with_buffer(BufferKind::Output, 40);
        ctx.write_block_hword(ID, 32, &[0x22u8; 32]).unwrap();
        let bytes = memory.to_vec();
        assert_eq!(&bytes[32..40], &[0x22; 8]);
        assert_eq!(&bytes[40..], &[0; 24]);
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 24);
    }

    #[test]
    fn hword_rules() {
        let (ctx, _) = ctx_with_buffer(BufferKind::InputOutput, 64);
        ctx.write_block_hword(ID, 32, &[5u32; 8]).unwrap();

        let mut out = [0u32; 8];
        ctx.read_block_hword(ID, BufferAttrib::Modified, 32, &mut out).unwrap();
        assert_eq!(out, [5; 8]);

        let err = ctx
            .read_block_hword(ID, BufferAttrib::None, 16, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::MisalignedOffset { required: 32, .. }));

        let mut short = [0u32; 4];
        let err = ctx
            .read_block_hword(ID, BufferAttrib::None, 0, &mut short)
            .unwrap_err();
        assert!(matches!(err, DataportError::InvalidBlockSize { bytes: 16, .. }));

        let err = ctx.write_block_hword(ID, 0, &[0u8; 48]).unwrap_err();
        assert!(matches!(err, DataportError::InvalidBlockSize { bytes: 48, .. }));
    }
}
