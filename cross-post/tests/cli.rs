//! CLI integration tests for cross-post
//!
//! These exercise argument handling and error paths that never reach the
//! network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn cross_post() -> Command {
    Command::cargo_bin("cross-post").unwrap()
}

fn credentials_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn help_describes_the_tool() {
    cross_post()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Publish a post"))
        .stdout(predicate::str::contains("--media"))
        .stdout(predicate::str::contains("--to"));
}

#[test]
fn missing_credentials_file_is_invalid_input() {
    cross_post()
        .arg("hello")
        .arg("--credentials")
        .arg("/nonexistent/credentials.toml")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("credentials file"));
}

#[test]
fn unknown_destination_is_invalid_input() {
    let creds = credentials_file("[twitter]\naccess_token = \"t\"\n");
    cross_post()
        .arg("hello")
        .arg("--credentials")
        .arg(creds.path())
        .arg("--to")
        .arg("myspace")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("unknown destination"));
}

#[test]
fn invalid_output_format_is_invalid_input() {
    cross_post()
        .arg("hello")
        .arg("--format")
        .arg("xml")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("invalid output format"));
}

#[test]
fn unreadable_media_file_is_invalid_input() {
    let creds = credentials_file("[twitter]\naccess_token = \"t\"\n");
    cross_post()
        .arg("hello")
        .arg("--credentials")
        .arg(creds.path())
        .arg("--media")
        .arg("/nonexistent/photo.jpg")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("media file"));
}

#[test]
fn unsupported_media_extension_is_invalid_input() {
    let creds = credentials_file("[twitter]\naccess_token = \"t\"\n");
    let media = credentials_file("not really media");
    cross_post()
        .arg("hello")
        .arg("--credentials")
        .arg(creds.path())
        .arg("--media")
        .arg(media.path())
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("media type"));
}

#[test]
fn empty_stdin_with_no_media_is_invalid_input() {
    // Content falls back to stdin; an empty pipe leaves nothing to publish.
    let creds = credentials_file("[twitter]\naccess_token = \"t\"\n");
    cross_post()
        .arg("--credentials")
        .arg(creds.path())
        .write_stdin("")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("content or at least one media"));
}
