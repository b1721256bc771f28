use rspatch::delta::DeltaWriter;
use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_rspatch").to_string()
}

fn sample_delta() -> Vec<u8> {
    let mut w = DeltaWriter::new(Vec::new());
    w.copy(0, 5).unwrap();
    w.literal(b"XXXXX").unwrap();
    w.copy(10, 10).unwrap();
    w.finish().unwrap()
}

#[test]
fn cli_patch_roundtrip() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.bin");
    let delta = dir.path().join("patch.delta");
    let output = dir.path().join("output.bin");

    std::fs::write(&target, b"abcde12345abcde12345").unwrap();
    std::fs::write(&delta, sample_delta()).unwrap();

    let st = Command::new(bin())
        .args(["patch", "--target"])
        .arg(&target)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"abcdeXXXXXabcde12345");
}

#[test]
fn cli_patch_to_stdout() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.bin");
    let delta = dir.path().join("patch.delta");
    std::fs::write(&target, b"abcde12345abcde12345").unwrap();
    std::fs::write(&delta, sample_delta()).unwrap();

    let out = Command::new(bin())
        .args(["patch", "-c", "-t"])
        .arg(&target)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"abcdeXXXXXabcde12345");
}

#[test]
fn cli_refuses_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.bin");
    let delta = dir.path().join("patch.delta");
    let output = dir.path().join("output.bin");
    std::fs::write(&target, b"abcde12345abcde12345").unwrap();
    std::fs::write(&delta, sample_delta()).unwrap();
    std::fs::write(&output, b"keep me").unwrap();

    let st = Command::new(bin())
        .args(["patch", "-t"])
        .arg(&target)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");

    let st = Command::new(bin())
        .args(["--force", "patch", "-t"])
        .arg(&target)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"abcdeXXXXXabcde12345");
}

#[test]
fn cli_refuses_output_that_is_the_target() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.bin");
    let delta = dir.path().join("patch.delta");
    std::fs::write(&target, b"abcde12345abcde12345").unwrap();
    std::fs::write(&delta, sample_delta()).unwrap();

    let out = Command::new(bin())
        .args(["-f", "patch", "-t"])
        .arg(&target)
        .arg(&delta)
        .arg(&target)
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("target"), "{stderr}");
    assert_eq!(std::fs::read(&target).unwrap(), b"abcde12345abcde12345");
}

#[test]
fn cli_refuses_output_that_is_the_delta() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.bin");
    let delta = dir.path().join("patch.delta");
    std::fs::write(&target, b"abcde12345abcde12345").unwrap();
    std::fs::write(&delta, sample_delta()).unwrap();

    let st = Command::new(bin())
        .args(["-f", "patch", "-t"])
        .arg(&target)
        .arg(&delta)
        .arg(dir.path().join(".").join("patch.delta"))
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&delta).unwrap(), sample_delta());
}

#[test]
fn cli_bad_magic_fails() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.bin");
    let delta = dir.path().join("patch.delta");
    std::fs::write(&target, b"abc").unwrap();
    std::fs::write(&delta, b"\xDE\xAD\xBE\xEF\x41\x01z").unwrap();

    let out = Command::new(bin())
        .args(["patch", "--check-only", "-t"])
        .arg(&target)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("not a delta stream"));

    let st = Command::new(bin())
        .args(["patch", "--check-only", "--magic", "0xDEADBEEF", "-t"])
        .arg(&target)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
}

#[test]
fn cli_dump_lists_instructions() {
    let dir = tempdir().unwrap();
    let delta = dir.path().join("patch.delta");
    std::fs::write(&delta, sample_delta()).unwrap();

    let out = Command::new(bin()).arg("dump").arg(&delta).output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("COPY_N1_N1") && lines[0].contains("where=0 length=5"));
    assert!(lines[1].contains("LITERAL_N1") && lines[1].contains("length=5"));
    assert!(lines[2].contains("where=10 length=10"));
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
}
