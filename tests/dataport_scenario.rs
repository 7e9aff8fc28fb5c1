//! End-to-end dataport behaviour across the surface and dataport crates.

use cm_dataport::{
    AtomicOp, AtomicOperands, BufferAttrib, BufferKind, DataportError, EmuContext, LaneMask, Registration,
    SurfaceFormat, SurfaceId, SurfaceMemory, SurfacePatch,
};
use pretty_assertions::assert_eq;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn words(memory: &SurfaceMemory) -> Vec<u32> {
    memory
        .to_vec()
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn write_then_atomic_add_with_out_of_range_lanes() {
    init_tracing();
    let ctx = EmuContext::default();
    let id = SurfaceId::new(7);
    // Backing store larger than the surface, so skipped lanes would be visible if they landed.
    let memory = SurfaceMemory::zeroed(128);
    ctx.register(Registration::surface_2d(
        id,
        BufferKind::InputOutput,
        memory.clone(),
        64,
        1,
        SurfaceFormat::R32Uint,
    ))
    .unwrap();

    ctx.write_block_1d(id, 0, &[1u32, 2, 3, 4]).unwrap();

    let mut old = [0u32; 8];
    ctx.write_atomic_dword(
        AtomicOp::Add,
        id,
        0,
        &[0, 1, 2, 3, 16, 17, 20, 31],
        &[10u32; 8],
        Some(&mut old[..]),
    )
    .unwrap();

    assert_eq!(&old[..4], &[1, 2, 3, 4]);
    let stored = words(&memory);
    assert_eq!(&stored[..4], &[11, 12, 13, 14]);
    assert!(stored[4..].iter().all(|&w| w == 0));

    let stats = ctx.stats().snapshot();
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.atomics, 1);
    assert_eq!(stats.lanes_out_of_bounds, 4);
}

#[test]
fn registry_resolves_at_most_one_descriptor() {
    let ctx = EmuContext::default();
    let id = SurfaceId::from_legacy_handle(0x1203);
    assert_eq!(id, SurfaceId::new(3));

    let first = SurfaceMemory::zeroed(16);
    let second = SurfaceMemory::zeroed(32);
    ctx.register(Registration::buffer(id, BufferKind::Input, first, 16))
        .unwrap();
    ctx.register(Registration::buffer(id, BufferKind::Input, second.clone(), 32))
        .unwrap();
    let desc = ctx.lookup(id).unwrap();
    assert_eq!(desc.width(), 32);
    assert!(desc.primary().same_allocation(&second));

    ctx.unregister(id).unwrap();
    let mut out = [0u32; 4];
    let err = ctx
        .read_block_1d(id, BufferAttrib::None, 0, &mut out)
        .unwrap_err();
    assert_eq!(
        err,
        DataportError::SurfaceNotRegistered {
            id,
            op: "read_block_1d"
        }
    );
}

#[test]
fn relocated_surface_answers_to_its_new_id() {
    let ctx = EmuContext::default();
    let old_id = SurfaceId::new(1);
    let new_id = SurfaceId::new(9);
    let memory = SurfaceMemory::from_bytes((0u8..16).collect());
    ctx.register(Registration::buffer(old_id, BufferKind::Input, memory, 16))
        .unwrap();
    ctx.modify(old_id, SurfacePatch::Id(new_id)).unwrap();

    let mut out = [0u8; 16];
    ctx.read_block_1d(new_id, BufferAttrib::None, 0, &mut out)
        .unwrap();
    assert_eq!(out.to_vec(), (0u8..16).collect::<Vec<_>>());
    assert!(ctx.lookup(old_id).is_err());
}

#[test]
fn misaligned_oword_write_never_mutates() {
    let ctx = EmuContext::default();
    let id = SurfaceId::new(2);
    let memory = SurfaceMemory::zeroed(64);
    ctx.register(Registration::buffer(id, BufferKind::Output, memory.clone(), 64))
        .unwrap();

    for offset in (1..64).filter(|o| o % 16 != 0) {
        let err = ctx.write_block_1d(id, offset, &[0xFFu8; 16]).unwrap_err();
        assert!(matches!(err, DataportError::MisalignedOffset { required: 16, .. }));
    }
    assert_eq!(memory.to_vec(), vec![0; 64]);
}

#[test]
fn yuyv_block_read_replicates_edge_macropixel() {
    let ctx = EmuContext::default();
    let id = SurfaceId::new(4);
    // One row of two YUYV macropixels: Y0 U0 Y1 V0 Y2 U1 Y3 V1.
    let row = [0x10u8, 0x80, 0x11, 0x90, 0x12, 0x81, 0x13, 0x91];
    ctx.register(Registration::surface_2d(
        id,
        BufferKind::Input,
        SurfaceMemory::from_bytes(row.to_vec()),
        8,
        1,
        SurfaceFormat::YcrcbNormal,
    ))
    .unwrap();

    let block: [[u8; 12]; 1] = ctx.read_block_2d(id, BufferAttrib::None, 0, 0).unwrap();
    assert_eq!(
        block[0],
        [0x10, 0x80, 0x11, 0x90, 0x12, 0x81, 0x13, 0x91, 0x13, 0x81, 0x13, 0x91]
    );
}
