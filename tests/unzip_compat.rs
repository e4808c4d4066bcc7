use std::process::Command;
use tempfile::tempdir;

use c_zip::{Archive, Method, OpenFlags};

// This test writes a ZIP using the library and then calls `unzip -t` to verify compatibility.
// If `unzip` is not present on the system, the test will be skipped.

#[test]
fn unzip_compatibility() {
    // Check if `unzip` exists by trying to run `unzip -v`.
    let check = Command::new("unzip").arg("-v").output();
    if check.is_err() {
        eprintln!("skipping test: `unzip` not found");
        return;
    }

    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("compat.zip");

    // Create zip with a stored and a deflated entry
    {
        let mut archive = Archive::open(&zip_path, OpenFlags::create()).unwrap();
        archive
            .add("hello.txt", b"hello from test".as_slice(), Some(Method::Store))
            .unwrap();
        let big = vec![0u8; 1024 * 1024];
        archive.add("big.bin", big, Some(Method::Deflate)).unwrap();
        archive.close().unwrap();
    }

    // Run `unzip -t` to test archive integrity
    let output = Command::new("unzip")
        .arg("-t")
        .arg(&zip_path)
        .output()
        .expect("failed to run unzip");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "unzip reported failure: {} {}",
        stdout,
        stderr
    );
}
