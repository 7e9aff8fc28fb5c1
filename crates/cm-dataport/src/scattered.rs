//! DWord scattered reads and writes: one element per lane at `(global + offset[i]) * size`.

use cm_surface::SurfaceId;

use crate::attrib::{BufferAttrib, LaneMask};
use crate::config::OobWritePolicy;
use crate::context::{block_read_view, block_write_view, require_lanes, require_simd_width, EmuContext};
use crate::element::{load_clipped, store, Element};
use crate::error::Result;
use crate::stats::LaneTally;

/// Lane counts of the scattered messages.
pub const SCATTERED_SIMD_WIDTHS: &[usize] = &[8, 16];

fn lane_position<T: Element>(global_offset: u32, element_offset: u32) -> u64 {
    (u64::from(global_offset) + u64::from(element_offset)) * T::SIZE as u64
}

impl EmuContext {
    /// Gathers one element per lane into `dst`.
    ///
    /// A lane whose position is at or past `width * height` bytes reads back `width * height - 1`
    /// instead of memory. Lanes disabled by `mask` leave `dst` untouched.
    pub fn read_scattered<T: Element>(
        &self,
        id: SurfaceId,
        attrib: BufferAttrib,
        global_offset: u32,
        element_offsets: &[u32],
        mask: LaneMask<'_>,
        dst: &mut [T],
    ) -> Result<()> {
        const OP: &str = "read_scattered";
        self.dispatch(OP, Some(id), || {
            let lanes = element_offsets.len();
            require_simd_width(OP, lanes, SCATTERED_SIMD_WIDTHS)?;
            require_lanes(OP, "dst", lanes, dst.len())?;
            mask.check_len(OP, lanes)?;
            let desc = self.resolve(id, OP)?;
            let view = block_read_view(&desc, attrib, OP)?;

            let extent = desc.extent();
            let saturated = T::from_u64_lossy(extent.saturating_sub(1));
            let mut tally = LaneTally::default();
            let bytes = view.read();
            for (lane, (slot, &offset)) in dst.iter_mut().zip(element_offsets).enumerate() {
                if !mask.enabled(lane) {
                    tally.masked();
                    continue;
                }
                let pos = lane_position::<T>(global_offset, offset);
                if pos >= extent {
                    *slot = saturated;
                    tally.out_of_bounds();
                } else {
                    *slot = load_clipped(&bytes, pos, extent);
                    tally.executed();
                }
            }
            drop(bytes);

            self.stats().inc_reads();
            self.finish(tally);
            Ok(())
        })
    }

    /// Scatters one element per lane.
    ///
    /// Lanes whose element does not fit below `width * height` bytes are dropped, along with
    /// every later lane under [`OobWritePolicy::StopAtFirst`].
    pub fn write_scattered<T: Element>(
        &self,
        id: SurfaceId,
        global_offset: u32,
        element_offsets: &[u32],
        values: &[T],
        mask: LaneMask<'_>,
    ) -> Result<()> {
        const OP: &str = "write_scattered";
        self.dispatch(OP, Some(id), || {
            let lanes = element_offsets.len();
            require_simd_width(OP, lanes, SCATTERED_SIMD_WIDTHS)?;
            require_lanes(OP, "values", lanes, values.len())?;
            mask.check_len(OP, lanes)?;
            let desc = self.resolve(id, OP)?;
            let view = block_write_view(&desc, OP)?;

            let extent = desc.extent();
            let stop_at_first = self.config().oob_write == OobWritePolicy::StopAtFirst;
            let mut tally = LaneTally::default();
            let mut bytes = view.write();
            for (lane, (&value, &offset)) in values.iter().zip(element_offsets).enumerate() {
                if !mask.enabled(lane) {
                    tally.masked();
                    continue;
                }
                let pos = lane_position::<T>(global_offset, offset);
                if pos + T::SIZE as u64 > extent || !store(&mut bytes, pos, value) {
                    if stop_at_first {
                        tally.out_of_bounds += (lanes - lane) as u64;
                        break;
                    }
                    tally.out_of_bounds();
                    continue;
                }
                tally.executed();
            }
            drop(bytes);

            self.stats().inc_writes();
            self.finish(tally);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use cm_surface::{BufferKind, Registration, SurfaceMemory};

    use super::*;
    use crate::config::DataportConfig;
    use crate::error::DataportError;

    const ID: SurfaceId = SurfaceId::new(3);

    fn ctx_with(config: DataportConfig, kind: BufferKind, words: u32) -> (EmuContext, SurfaceMemory) {
        let ctx = EmuContext::new(config);
        let bytes: Vec<u8> = (0..words).flat_map(|w| (w * 10).to_ne_bytes()).collect();
        let memory = SurfaceMemory::from_bytes(bytes);
        ctx.register(Registration::buffer(ID, kind, memory.clone(), words * 4))
            .unwrap();
        (ctx, memory)
    }

    #[test]
    fn gathers_and_saturates() {
        let (ctx, _) = ctx_with(DataportConfig::default(), BufferKind::Input, 8);
        let mut out = [0u32; 8];
        ctx.read_scattered(ID, BufferAttrib::None, 1, &[0, 2, 4, 6, 7, 100, 6, 0], LaneMask::All, &mut out)
            .unwrap();
        // Lanes 4 and 5 address elements 8 and 101, past the 32-byte surface.
        assert_eq!(out, [10, 30, 50, 70, 31, 31, 70, 10]);
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 2);
    }

    #[test]
    fn masked_read_leaves_destination() {
        let (ctx, _) = ctx_with(DataportConfig::default(), BufferKind::InputOutput, 8);
        let mask = [false, true, false, true, false, true, false, true];
        let mut out = [7u32; 8];
        ctx.read_scattered(
            ID,
            BufferAttrib::Modified,
            0,
            &[0, 1, 2, 3, 4, 5, 6, 7],
            LaneMask::from(&mask[..]),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, [7, 10, 7, 30, 7, 50, 7, 70]);
    }

    #[test]
    fn rejects_unsupported_widths() {
        let (ctx, _) = ctx_with(DataportConfig::default(), BufferKind::Input, 8);
        let mut out = [0u32; 4];
        let err = ctx
            .read_scattered(ID, BufferAttrib::None, 0, &[0; 4], LaneMask::All, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::UnsupportedSimdWidth { lanes: 4, .. }));

        let mut out = [0u32; 16];
        let err = ctx
            .read_scattered(ID, BufferAttrib::None, 0, &[0; 8], LaneMask::All, &mut out)
            .unwrap_err();
        assert!(matches!(err, DataportError::VectorLengthMismatch { what: "dst", .. }));
    }

    #[test]
    fn write_skips_out_of_bounds_lanes() {
        let (ctx, memory) = ctx_with(DataportConfig::default(), BufferKind::Output, 4);
        ctx.write_scattered(ID, 0, &[3, 9, 0, 8, 1, 1, 2, 2], &[1u32, 2, 3, 4, 5, 6, 7, 8], LaneMask::All)
            .unwrap();
        let bytes = memory.to_vec();
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(words, vec![3, 6, 8, 1]);
        let snap = ctx.stats().snapshot();
        assert_eq!(snap.lanes_out_of_bounds, 2);
        assert_eq!(snap.lanes_executed, 6);
    }

    #[test]
    fn stop_policy_drops_remaining_lanes() {
        let config = DataportConfig {
            oob_write: OobWritePolicy::StopAtFirst,
            ..DataportConfig::default()
        };
        let (ctx, memory) = ctx_with(config, BufferKind::Output, 4);
        ctx.write_scattered(ID, 0, &[0, 1, 9, 2, 3, 0, 0, 0], &[5u32; 8], LaneMask::All)
            .unwrap();
        let bytes = memory.to_vec();
        assert_eq!(&bytes[..8], [5u32, 5].map(u32::to_ne_bytes).concat().as_slice());
        assert_eq!(&bytes[8..12], 20u32.to_ne_bytes().as_slice());
        assert_eq!(ctx.stats().snapshot().lanes_out_of_bounds, 6);
    }

    #[test]
    fn write_to_input_surface_is_rejected() {
        let (ctx, memory) = ctx_with(DataportConfig::default(), BufferKind::Input, 4);
        let before = memory.to_vec();
        let err = ctx
            .write_scattered(ID, 0, &[0; 8], &[1u32; 8], LaneMask::All)
            .unwrap_err();
        assert!(matches!(err, DataportError::InvalidSurfaceKind { .. }));
        assert_eq!(memory.to_vec(), before);
    }
}
