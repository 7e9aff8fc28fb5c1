use std::io::Write;

use cm_dataport::EmuContext;
use cm_emu_replay::replay;
use cm_emu_replay::script::load_script;
use pretty_assertions::assert_eq;

#[test]
fn replays_atomic_scenario_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"[
            {"step": "register", "id": 7, "kind": "input_output", "width": 64, "format": "R32_UINT"},
            {"step": "write_block_1d", "id": 7, "offset": 0, "values": [1, 2, 3, 4]},
            {"step": "atomic", "id": 7, "opcode": "add", "offsets": [0, 1, 2, 3, 16, 17, 18, 19],
             "src0": [10, 10, 10, 10, 10, 10, 10, 10]},
            {"step": "read_scattered", "id": 7, "offsets": [0, 1, 2, 3, 4, 99, 15, 16]}
        ]"#,
    )
    .unwrap();

    let steps = load_script(file.path()).unwrap();
    let ctx = EmuContext::default();
    let mut out = Vec::<u8>::new();
    let summary = replay(&ctx, &steps, &mut out, false).unwrap();
    assert_eq!(summary.failed, 0);

    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "step 2 atomic: [1, 2, 3, 4, 0, 0, 0, 0]",
            "step 3 read_scattered: [11, 12, 13, 14, 0, 63, 0, 63]",
        ]
    );
}

#[test]
fn missing_script_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_script(&dir.path().join("absent.json")).unwrap_err();
    assert!(format!("{err:#}").contains("absent.json"));
}
