use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_safemark"))
}

fn temp_file(name: &str, extension: &str, contents: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("time");
    let file_name = format!(
        "safemark_cli_{}_{}_{}.{}",
        name,
        now.as_secs(),
        now.subsec_nanos(),
        extension
    );
    path.push(file_name);
    fs::write(&path, contents).expect("write temp file");
    path
}

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(bin_path())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("run")
}

#[test]
fn renders_sanitized_markdown_by_default() {
    let input = temp_file(
        "render",
        "md",
        "# Hi\n\n<script>alert(1)</script>\n\n[a](javascript:alert(1))\n",
    );
    let output = Command::new(bin_path())
        .args([input.to_str().expect("path")])
        .output()
        .expect("run");

    assert!(output.status.success(), "expected success exit code");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("<h1>Hi</h1>"));
    assert!(stdout.contains("<p><a>a</a></p>"));
    assert!(!stdout.contains("script"), "expected script to be dropped");
}

#[test]
fn raw_skips_the_sanitizer() {
    let input = temp_file("raw", "md", "<script>alert(1)</script>\n");
    let output = Command::new(bin_path())
        .args(["--raw", input.to_str().expect("path")])
        .output()
        .expect("run");

    assert!(output.status.success(), "expected success exit code");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("<script>alert(1)</script>"));
}

#[test]
fn stream_completes_the_tail() {
    let output = run_with_stdin(&["--stream"], "some text and `some code");

    assert!(output.status.success(), "expected success exit code");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "<p>some text and <code>some code</code></p>\n");
}

#[test]
fn html_mode_sanitizes_html_input() {
    let output = run_with_stdin(&["--html"], "<div>safe<script>alert(1)</script>content</div>");

    assert!(output.status.success(), "expected success exit code");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "<div>safecontent</div>");
}

#[test]
fn config_file_widens_media_protocols() {
    let config = temp_file(
        "config",
        "json",
        r#"{ "allowedMediaProtocols": { "augment": ["data"] } }"#,
    );
    let output = run_with_stdin(
        &["--html", "--config", config.to_str().expect("path")],
        r#"<img src="data:image/png;base64,AAAA">"#,
    );

    assert!(output.status.success(), "expected success exit code");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        r#"<img src="data:image/png;base64,AAAA">"#
    );
}

#[test]
fn invalid_config_fails_with_exit_code_one() {
    let config = temp_file("bad_config", "json", r#"{ "allowedTags": { "override": "all" } }"#);
    let output = run_with_stdin(&["--config", config.to_str().expect("path")], "text\n");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid wildcard 'all'"), "stderr was {:?}", stderr);
}

#[test]
fn unknown_option_is_a_usage_error() {
    let output = Command::new(bin_path())
        .args(["--sanitized"])
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage: safemark"));
}

#[test]
fn tokens_dumps_the_token_stream() {
    let output = run_with_stdin(&["--tokens"], "| a | b |");

    assert!(output.status.success(), "expected success exit code");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Paragraph"), "stdout was {:?}", stdout);

    let output = run_with_stdin(&["--tokens", "--stream"], "| a | b |");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Table"), "stdout was {:?}", stdout);
}

#[test]
fn plaintext_flag_shows_rejected_markup() {
    let output = run_with_stdin(&["--html", "--plaintext"], "<p><custom>x</custom></p>");

    assert!(output.status.success(), "expected success exit code");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "<p>&lt;custom&gt;x&lt;/custom&gt;</p>"
    );
}
