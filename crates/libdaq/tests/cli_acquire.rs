#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/libdaq-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn libdaq() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_libdaq"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect()
}

#[test]
fn acquire_simulated_emits_averaged_batches() {
    let output = libdaq()
        .args(["--format", "json", "acquire", "--simulate"])
        .args(["--rate", "10khz", "--voltage", "10v", "--channel", "2"])
        .args(["--count", "3", "--average"])
        .output()
        .expect("acquire should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let batches = json_lines(&output.stdout);
    assert_eq!(batches.len(), 3);
    for (i, batch) in batches.iter().enumerate() {
        assert_eq!(batch["channel"], 2);
        assert_eq!(batch["sequence"], i);
        assert_eq!(batch["samples"], 32);
        assert!(batch.get("volts").is_none());
        let mean = batch["mean_volts"].as_f64().expect("mean should be a number");
        assert!((-10.0..=10.0).contains(&mean));
    }
}

#[test]
fn acquire_all_channels_pretty() {
    let output = libdaq()
        .args(["--format", "pretty", "acquire", "--simulate", "--all"])
        .args(["--rate", "10k", "--count", "8"])
        .output()
        .expect("acquire should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for channel in 0..8 {
        assert!(
            stdout.contains(&format!("AIN{channel} seq=0")),
            "missing AIN{channel} in {stdout}"
        );
    }
    assert!(stdout.contains("8 batches"));
}

#[test]
fn acquire_against_emulator_socket() {
    let dir = unique_temp_dir("emulate");
    let sock_path = dir.join("daq122.sock");

    let mut child = libdaq()
        .arg("emulate")
        .arg("--socket")
        .arg(&sock_path)
        .args(["--unpaced", "--garbage-every", "4"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("emulate should start");

    wait_for_socket(&sock_path, Duration::from_secs(3));

    let output = libdaq()
        .args(["--format", "json", "acquire", "--socket"])
        .arg(&sock_path)
        .args(["--count", "5", "--receive-timeout", "500ms"])
        .output()
        .expect("acquire should run");

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let batches = json_lines(&output.stdout);
    assert_eq!(batches.len(), 5);
    assert!(batches
        .iter()
        .all(|b| b["volts"].as_array().map(Vec::len) == Some(32)));
}

#[test]
fn acquire_stops_after_duration() {
    let start = Instant::now();
    let output = libdaq()
        .args(["--format", "json", "acquire", "--simulate"])
        .args(["--rate", "1khz", "--duration", "300ms", "--average"])
        .output()
        .expect("acquire should run");

    assert!(output.status.success());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!json_lines(&output.stdout).is_empty());
}
