use assert_cmd::Command;
use keepwriting::history::{HistoryStore, SqliteHistoryStore};
use keepwriting::recorder::SessionRecord;
use tempfile::tempdir;

fn seeded_db(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("history.db");
    let mut store = SqliteHistoryStore::open(&path).unwrap();
    store
        .save_history(&[
            SessionRecord::new(250, 300, true),
            SessionRecord::new(12, 40, false),
        ])
        .unwrap();
    path
}

#[test]
fn history_csv_exports_every_session() {
    let dir = tempdir().unwrap();
    let db = seeded_db(dir.path());

    let output = Command::cargo_bin("keepwriting")
        .unwrap()
        .env("HOME", dir.path())
        .args(["history", "--csv", "--db"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "date,duration_secs,words,completed");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with(",300,250,true"));
    assert!(lines[2].ends_with(",40,12,false"));
}

#[test]
fn history_summary_reports_totals() {
    let dir = tempdir().unwrap();
    let db = seeded_db(dir.path());

    let output = Command::cargo_bin("keepwriting")
        .unwrap()
        .env("HOME", dir.path())
        .arg("history")
        .arg("--db")
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("2 sessions, 1 completed, 1 failed (50% success)"));
    assert!(stdout.contains("262 words"));
}

#[test]
fn history_on_empty_database() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("keepwriting")
        .unwrap()
        .env("HOME", dir.path())
        .args(["history", "--db"])
        .arg(dir.path().join("fresh.db"))
        .assert()
        .success()
        .stdout("No sessions yet.\n");
}

#[test]
fn invalid_settings_are_rejected_before_the_tui() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("keepwriting")
        .unwrap()
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["--idle", "2", "--warning", "4", "--db"])
        .arg(dir.path().join("h.db"))
        .assert()
        .failure();
}
