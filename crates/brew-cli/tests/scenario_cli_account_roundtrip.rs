use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use uuid::Uuid;

/// `brew account open` then `brew account show` / `orders`.
///
/// This test is DB-backed and is skipped if BREW_DATABASE_URL is not set.
#[tokio::test]
async fn account_open_then_show() -> anyhow::Result<()> {
    let url = match std::env::var(brew_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BREW_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    brew_db::migrate(&pool).await?;

    let id = format!("TEST_CLI_{}", Uuid::new_v4());

    Command::cargo_bin("brew")?
        .args(["account", "open", "--id", &id, "--balance", "10.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("balance=10.00"));

    Command::cargo_bin("brew")?
        .args(["account", "show", "--id", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("account_id={id} balance=10.00")));

    Command::cargo_bin("brew")?
        .args(["account", "orders", "--id", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders=0"));

    Command::cargo_bin("brew")?
        .args(["account", "open", "--id", &id, "--balance", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --balance"));

    Ok(())
}
