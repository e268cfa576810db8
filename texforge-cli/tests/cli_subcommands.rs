use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "texforge_cli_{label}_{}_{}",
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn assert_schema_version(value: &serde_json::Value) {
    assert_eq!(
        value.get("schema_version").and_then(|v| v.as_u64()),
        Some(1),
        "missing schema_version=1 field"
    );
}

fn json_stdout(output: &std::process::Output, label: &str) -> serde_json::Value {
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("{label} stdout is not JSON: {e}"))
}

#[test]
fn help_lists_subcommands() {
    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .arg("--help")
        .output()
        .expect("run texforge --help");

    assert!(
        output.status.success(),
        "--help failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["probe", "upscale", "config"] {
        assert!(stdout.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn upscale_help_lists_repeat_and_async() {
    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args(["upscale", "--help"])
        .output()
        .expect("run texforge upscale --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--repeat", "--async", "--module", "--model", "--json"] {
        assert!(stdout.contains(flag), "missing {flag} in upscale help");
    }
}

#[test]
fn config_print_default_emits_defaults() {
    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args(["config", "--print-default"])
        .output()
        .expect("run texforge config --print-default");

    assert!(
        output.status.success(),
        "config --print-default failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value = json_stdout(&output, "config --print-default");
    assert_eq!(
        value.get("warn_on_degrade").and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(
        value.pointer("/cache/policy").and_then(|v| v.as_str()),
        Some("unbounded")
    );
    assert!(value.get("backend").is_some_and(|v| v.is_null()));
}

#[test]
fn config_check_normalizes_file() {
    let dir = unique_temp_dir("config");
    let path = dir.join("texforge.json");
    fs::write(
        &path,
        r#"{"cache":{"policy":"lru","max_entries":16},"backend":{"kind":"external","module":"libaccel.so"}}"#,
    )
    .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args(["config", "--check", path.to_str().expect("utf8 path")])
        .output()
        .expect("run texforge config --check");

    assert!(
        output.status.success(),
        "config --check failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value = json_stdout(&output, "config --check");
    assert_eq!(
        value.pointer("/cache/max_entries").and_then(|v| v.as_u64()),
        Some(16)
    );
    assert_eq!(
        value.pointer("/backend/module").and_then(|v| v.as_str()),
        Some("libaccel.so")
    );
    assert_eq!(
        value.get("warn_on_degrade").and_then(|v| v.as_bool()),
        Some(true)
    );
}

#[test]
fn config_check_rejects_malformed_file() {
    let dir = unique_temp_dir("bad_config");
    let path = dir.join("broken.json");
    fs::write(&path, "{ not json").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args(["config", "--check", path.to_str().expect("utf8 path")])
        .output()
        .expect("run texforge config --check");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "nothing printed for a bad config");
}

#[test]
fn probe_missing_module_reports_json_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args([
            "probe",
            "--module",
            "/nonexistent/libtexforge_accel_missing.so",
            "--json",
        ])
        .output()
        .expect("run texforge probe --json");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("\u{1b}["),
        "stderr should not include ANSI escapes when not a TTY: {stderr}"
    );

    let value = json_stdout(&output, "probe --json");
    assert_schema_version(&value);
    assert_eq!(value.get("command").and_then(|v| v.as_str()), Some("probe"));
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(value.get("code").and_then(|v| v.as_u64()), Some(100));
    assert!(
        value
            .get("error")
            .and_then(|v| v.as_str())
            .is_some_and(|e| e.contains("libtexforge_accel_missing")),
        "error should name the module"
    );
}

#[test]
fn upscale_without_backend_is_a_usage_error() {
    let dir = unique_temp_dir("no_backend");
    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args([
            "upscale",
            "--input",
            dir.join("in.rgb").to_str().expect("utf8 input"),
            "--width",
            "64",
            "--height",
            "64",
            "--output",
            dir.join("out.rgb").to_str().expect("utf8 output"),
            "--json",
        ])
        .output()
        .expect("run texforge upscale");

    assert_eq!(output.status.code(), Some(64));
    let value = json_stdout(&output, "upscale --json");
    assert_schema_version(&value);
    assert_eq!(value.get("command").and_then(|v| v.as_str()), Some("upscale"));
    assert_eq!(value.get("code").and_then(|v| v.as_u64()), Some(64));
}

#[test]
fn upscale_rejects_short_input_before_binding() {
    let dir = unique_temp_dir("short_input");
    let input = dir.join("in.rgb");
    fs::write(&input, [0u8; 10]).expect("write input");

    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args([
            "upscale",
            "--input",
            input.to_str().expect("utf8 input"),
            "--width",
            "4",
            "--height",
            "4",
            "--output",
            dir.join("out.rgb").to_str().expect("utf8 output"),
            "--module",
            "/nonexistent/libtexforge_accel_missing.so",
            "--json",
        ])
        .output()
        .expect("run texforge upscale");

    let value = json_stdout(&output, "upscale --json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(value.get("code").and_then(|v| v.as_u64()), Some(501));
    assert!(!dir.join("out.rgb").exists());
}

#[test]
fn upscale_rejects_zero_repeat() {
    let output = Command::new(env!("CARGO_BIN_EXE_texforge"))
        .args([
            "upscale", "--input", "in.rgb", "--width", "1", "--height", "1", "--output",
            "out.rgb", "--module", "libaccel.so", "--repeat", "0",
        ])
        .output()
        .expect("run texforge upscale --repeat 0");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--repeat"), "clap should name the flag: {stderr}");
}
