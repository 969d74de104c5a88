use std::io::Write;
use std::net::TcpListener;

use assert_cmd::Command;
use predicates::prelude::*;

fn client() -> Command {
    let mut cmd = Command::cargo_bin("dxfeed-client").unwrap();
    cmd.env_remove("DXFEED_TOKEN")
        .env_remove("DXFEED_CREDENTIALS")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_options() {
    client()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--symbols-file"))
        .stdout(predicate::str::contains("--credentials"))
        .stdout(predicate::str::contains("--no-keepalive"));
}

#[test]
fn symbols_source_is_required() {
    client()
        .args(["--token", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--symbols"));
}

#[test]
fn token_or_credentials_is_required() {
    client()
        .args(["--symbols", "SPY"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--token"));
}

#[test]
fn empty_symbols_list_is_rejected() {
    client()
        .args(["--symbols", " , ", "--token", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no symbols in"));
}

#[test]
fn empty_symbols_file_is_rejected() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "# nothing").unwrap();

    client()
        .arg("--symbols-file")
        .arg(f.path())
        .args(["--token", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no symbols in"));
}

#[test]
fn malformed_symbol_is_rejected_before_connecting() {
    client()
        .args(["--symbols", "SPY, AAPL{=5m", "--token", "t", "--url", "ws://127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unbalanced"));
}

#[test]
fn unreachable_server_fails() {
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

    client()
        .args(["--symbols", "SPY", "--token", "t"])
        .args(["--url", &format!("ws://127.0.0.1:{port}/realtime")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("feed failed in state Connecting"));
}

#[test]
fn token_comes_from_env() {
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

    // токен из окружения проходит валидацию; падаем уже на соединении
    client()
        .env("DXFEED_TOKEN", "from-env")
        .args(["--symbols", "SPY"])
        .args(["--url", &format!("ws://127.0.0.1:{port}")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("feed failed"))
        .stderr(predicate::str::contains("from-env").not());
}
