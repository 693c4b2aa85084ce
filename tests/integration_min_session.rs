// Drives the compiled binary through a pseudo terminal.
//
// Requires a TTY, so it is ignored by default:
// `cargo test --test integration_min_session -- --ignored`

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn short_session_starts_and_quits() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let bin = assert_cmd::cargo::cargo_bin("keepwriting");
    let cmd = format!(
        "{} --words 2 --db {}",
        bin.display(),
        dir.path().join("history.db").display()
    );

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));

    // ctrl+g, two words, then give the goal check time to run
    p.send("\x07")?;
    p.send("hello world ")?;
    std::thread::sleep(Duration::from_millis(1500));

    p.send("\x1b")?;
    p.expect(Eof)?;
    Ok(())
}
