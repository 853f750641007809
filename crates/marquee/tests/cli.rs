use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command with a private database and no ambient API configuration.
fn marquee(db: &Path) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("marquee").into();
    cmd.arg("--db").arg(db);
    cmd.env("NO_COLOR", "1");
    for var in [
        "MARQUEE_DB",
        "MARQUEE_CRAWL_URL",
        "MARQUEE_DEBUG",
        "TMDB_API_KEY",
        "OMDB_API_KEY",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn temp_db() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("data").join("marquee.db");
    (tmp, db)
}

#[test]
fn binary_runs() {
    let mut cmd: Command = cargo_bin_cmd!("marquee").into();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("marquee"));
}

#[test]
fn report_on_empty_library() {
    let (tmp, db) = temp_db();
    marquee(&db)
        .arg("report-missing")
        .assert()
        .success()
        .stderr(predicate::str::contains("No missing metadata"));
    assert!(db.exists());
    drop(tmp);
}

#[test]
fn refresh_unknown_movie_reports_one_failure() {
    let (tmp, db) = temp_db();
    marquee(&db)
        .args(["refresh-metadata", "--movie-id", "999"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Failed: 1"))
        .stderr(predicate::str::contains("Processed: 1"));
    drop(tmp);
}

#[test]
fn credits_on_empty_library() {
    let (tmp, db) = temp_db();
    marquee(&db)
        .arg("fetch-credits")
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed: 0"));
    drop(tmp);
}

#[test]
fn crawl_requires_url() {
    let (tmp, db) = temp_db();
    marquee(&db)
        .arg("crawl")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MARQUEE_CRAWL_URL"));
    drop(tmp);
}

#[test]
fn crawl_rejects_bad_url() {
    let (tmp, db) = temp_db();
    marquee(&db)
        .args(["crawl", "--url", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid listing URL"));
    drop(tmp);
}

#[test]
fn all_and_movie_id_conflict() {
    let (tmp, db) = temp_db();
    marquee(&db)
        .args(["refresh-metadata", "--all", "--movie-id", "1"])
        .assert()
        .failure();
    drop(tmp);
}
