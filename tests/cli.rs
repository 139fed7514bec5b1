use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

use tally::{Account, SqliteStore};

fn tally_cmd() -> Command {
    Command::cargo_bin("tally").unwrap()
}

fn account(id: &str, user_id: &str, balance: f64) -> Account {
    Account {
        id: id.to_string(),
        user_id: user_id.to_string(),
        balance,
        account_type: Some("checking".to_string()),
        extra: serde_json::Map::new(),
    }
}

fn seed_db(dir: &tempfile::TempDir, accounts: &[(&str, &str, f64)]) -> PathBuf {
    let path = dir.path().join("ledger.db");
    let store = SqliteStore::open(&path).unwrap();
    for (id, user_id, balance) in accounts {
        store.put_account(&account(id, user_id, *balance)).unwrap();
    }
    path
}

#[test]
fn reconciles_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let db = seed_db(&dir, &[("acc-1", "user-a", 1000.0)]);

    tally_cmd()
        .args(["--db", db.to_str().unwrap(), "--seed", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("adjusted by $1,000.00"))
        .stdout(predicate::str::contains("Reconciliation summary"));
}

#[test]
fn second_run_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let db = seed_db(&dir, &[("acc-1", "user-a", 1000.0), ("acc-2", "user-b", -250.0)]);

    tally_cmd()
        .args(["--db", db.to_str().unwrap(), "--seed", "1"])
        .assert()
        .success();

    let output = tally_cmd()
        .args(["--db", db.to_str().unwrap(), "--seed", "2", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["processed"], 2);
    assert_eq!(summary["inSync"], 2);
    assert_eq!(summary["transactionsWritten"], 0);
}

#[test]
fn check_mode_reports_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let db = seed_db(&dir, &[("acc-1", "user-a", 500.0)]);

    tally_cmd()
        .args(["--db", db.to_str().unwrap(), "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("out of sync"));

    let store = SqliteStore::open(&db).unwrap();
    assert_eq!(store.transaction_count().unwrap(), 0);
}

#[test]
fn filters_restrict_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = seed_db(&dir, &[("acc-1", "user-a", 100.0), ("acc-2", "user-b", 100.0)]);

    let output = tally_cmd()
        .args(["--db", db.to_str().unwrap(), "--user-id", "user-a", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["accounts"][0]["accountId"], "acc-1");

    // Camel-case flag spelling from the portal's tooling still works.
    tally_cmd()
        .args(["--db", db.to_str().unwrap(), "--accountId", "acc-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acc-2"));
}

#[test]
fn unreachable_store_exits_nonzero() {
    tally_cmd()
        .args(["--db", "/nonexistent/path/ledger.db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open ledger store"));
}

#[test]
fn empty_store_completes_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let db = seed_db(&dir, &[]);

    let output = tally_cmd()
        .args(["--db", db.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["processed"], 0);
    assert_eq!(summary["failed"], 0);
}
