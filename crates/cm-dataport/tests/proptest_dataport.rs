#![cfg(not(target_arch = "wasm32"))]

use cm_dataport::{
    BufferAttrib, BufferKind, EmuContext, LaneMask, Registration, SurfaceFormat, SurfaceId, SurfaceMemory,
};
use proptest::prelude::*;

const ID: SurfaceId = SurfaceId::new(2);

fn block_formats() -> Vec<SurfaceFormat> {
    SurfaceFormat::ALL
        .iter()
        .copied()
        .filter(|format| !format.is_packed_yuv())
        .collect()
}

prop_compose! {
    /// A surface geometry with room for a 3x2 block of u32 at a dword-aligned in-bounds spot.
    fn arb_placement()(width_dw in 2u32..24, height in 3u32..12)(
        width_dw in Just(width_dw),
        height in Just(height),
        x_dw in 0..=width_dw - 2,
        y in 0..=height - 3,
    ) -> (u32, u32, i32, i32) {
        (width_dw * 4, height, (x_dw * 4) as i32, y as i32)
    }
}

proptest! {
    #[test]
    fn block_2d_write_then_read_is_identity(
        format in prop::sample::select(block_formats()),
        (width, height, x, y) in arb_placement(),
        block in any::<[[u32; 2]; 3]>(),
        fill in any::<u8>(),
    ) {
        let ctx = EmuContext::default();
        // Room for the chroma plane of planar formats too.
        let memory = SurfaceMemory::from_bytes(vec![fill; (width * height * 2) as usize]);
        ctx.register(Registration::surface_2d(ID, BufferKind::InputOutput, memory, width, height, format))
            .unwrap();

        ctx.write_block_2d(ID, BufferAttrib::None, x, y, &block).unwrap();
        let read: [[u32; 2]; 3] = ctx.read_block_2d(ID, BufferAttrib::Modified, x, y).unwrap();
        prop_assert_eq!(read, block);
    }

    #[test]
    fn scattered_reads_saturate_each_lane_independently(
        words in 1u32..64,
        picks in prop::collection::vec((any::<bool>(), any::<u32>()), 16),
    ) {
        let ctx = EmuContext::default();
        let bytes: Vec<u8> = (0..words).flat_map(|w| (w + 1000).to_ne_bytes()).collect();
        ctx.register(Registration::buffer(ID, BufferKind::Input, SurfaceMemory::from_bytes(bytes), words * 4))
            .unwrap();

        // Each lane is either in range or pushed at least one element past the end.
        let offsets: Vec<u32> = picks
            .iter()
            .map(|&(oob, seed)| if oob { words + seed % 1024 } else { seed % words })
            .collect();
        let mut out = [0u32; 16];
        ctx.read_scattered(ID, BufferAttrib::None, 0, &offsets, LaneMask::All, &mut out)
            .unwrap();

        let extent = words * 4;
        for (lane, (&offset, &(oob, _))) in offsets.iter().zip(&picks).enumerate() {
            let expected = if oob { extent - 1 } else { offset + 1000 };
            prop_assert_eq!(out[lane], expected, "lane {}", lane);
        }
    }
}
