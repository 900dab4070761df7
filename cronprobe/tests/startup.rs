use std::io::Write;
use std::process::{Command, Output};

fn cronprobe(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cronprobe"));
    cmd.env_clear().args(args);
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("run cronprobe")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn malformed_query_params_exit_before_scheduling() {
    let output = cronprobe(
        &["run"],
        &[
            ("SCHEDULE", "* * * * *"),
            ("BASE_URL", "https://probe.example.com"),
            ("QUERY_PARAMS", "[{\"key\": \"x\", "),
        ],
    );

    assert!(!output.status.success());
    let stderr = stderr(&output);
    assert!(stderr.contains("QUERY_PARAMS"), "stderr: {stderr}");
    assert!(!stderr.contains("Scheduler registered"), "stderr: {stderr}");
}

#[test]
fn missing_base_url_is_fatal() {
    let output = cronprobe(&["serve"], &[("SCHEDULE", "* * * * *")]);

    assert!(!output.status.success());
    let stderr = stderr(&output);
    assert!(stderr.contains("base_url"), "stderr: {stderr}");
    assert!(!stderr.contains("Scheduler registered"), "stderr: {stderr}");
}

#[test]
fn invalid_schedule_is_fatal() {
    let output = cronprobe(
        &["run"],
        &[("SCHEDULE", "sometimes"), ("BASE_URL", "https://h")],
    );
    assert!(!output.status.success());
}

#[test]
fn check_config_from_env() {
    let output = cronprobe(
        &["check-config"],
        &[
            ("SCHEDULE", "*/5 * * * *"),
            ("BASE_URL", "https://probe.example.com"),
            ("ENDPOINTS", "[\"a\", \"b\"]"),
            ("QUERY_PARAMS", "[{\"key\": \"page\", \"range\": 10}]"),
            ("API_KEY", "outbound"),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("endpoints: 2"));
    assert!(stdout.contains("query_params: 1"));
    assert!(stdout.contains("outbound_auth: true"));
    assert!(!stdout.contains("outbound\n"), "secrets are not printed");
}

#[test]
fn check_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(
        file,
        r#"
probe:
    schedule: "0 */2 * * * *"
    base_url: https://probe.example.com
    endpoints: [a]
    strategy: broadcast_all
"#
    )
    .expect("write yaml");

    let output = cronprobe(
        &["--config", file.path().to_str().unwrap(), "check-config"],
        &[],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("strategy: broadcast_all"));
    assert!(stdout.contains("endpoints: 1"));
}

#[test]
fn fire_with_no_endpoints_is_a_noop() {
    let output = cronprobe(
        &["fire"],
        &[("SCHEDULE", "* * * * *"), ("BASE_URL", "https://probe.example.com")],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let batch: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json batch");
    assert_eq!(batch["trigger"], "manual");
    assert_eq!(batch["outcomes"].as_array().map(Vec::len), Some(0));
}
