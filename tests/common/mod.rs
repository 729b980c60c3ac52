// Shared helpers for the integration suites. Only a subset is used by each
// suite.
#![allow(dead_code)]

use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

/// Run dmsieve with the given arguments, feeding `input` on stdin.
/// Returns (stdout, stderr, exit code).
pub fn run_dmsieve_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    let binary_path = env!("CARGO_BIN_EXE_dmsieve");

    let mut child = Command::new(binary_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start dmsieve");

    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run dmsieve against a temporary file holding `file_content`.
pub fn run_dmsieve_with_file(args: &[&str], file_content: &str) -> (String, String, i32) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(file_content.as_bytes())
        .expect("Failed to write to temp file");

    let mut full_args = args.to_vec();
    let path = temp_file.path().to_str().unwrap().to_string();
    full_args.push(&path);

    let binary_path = env!("CARGO_BIN_EXE_dmsieve");
    let output = Command::new(binary_path)
        .args(&full_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute dmsieve");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run dmsieve against several temporary files, in order.
pub fn run_dmsieve_with_files(args: &[&str], contents: &[&str]) -> (String, String, i32) {
    let temp_files: Vec<NamedTempFile> = contents
        .iter()
        .map(|content| {
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            file.write_all(content.as_bytes())
                .expect("Failed to write to temp file");
            file
        })
        .collect();

    let paths: Vec<String> = temp_files
        .iter()
        .map(|f| f.path().to_str().unwrap().to_string())
        .collect();
    let mut full_args = args.to_vec();
    for path in &paths {
        full_args.push(path);
    }

    let binary_path = env!("CARGO_BIN_EXE_dmsieve");
    let output = Command::new(binary_path)
        .args(&full_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute dmsieve");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Minimal well-formed packet with the two pairs every mode reads.
pub fn packet(timestamp: &str, type_id: &str) -> String {
    format!(
        "<dm_log_packet><pair key=\"timestamp\">{timestamp}</pair>\
         <pair key=\"type_id\">{type_id}</pair></dm_log_packet>"
    )
}

/// A packet with extra root pairs, for the extractors that read them.
pub fn packet_with_pairs(timestamp: &str, type_id: &str, pairs: &[(&str, &str)]) -> String {
    let mut body = format!(
        "<dm_log_packet><pair key=\"timestamp\">{timestamp}</pair>\
         <pair key=\"type_id\">{type_id}</pair>"
    );
    for (key, value) in pairs {
        body.push_str(&format!("<pair key=\"{key}\">{value}</pair>"));
    }
    body.push_str("</dm_log_packet>");
    body
}
