use roborock_exporter::metrics::DEFINITIONS;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn exporter() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_roborock_exporter"));
    command
        .env_remove("IP_ADDRESS")
        .env_remove("TOKEN")
        .env("EXPORTER_PORT", "0");
    command
}

/// Test that a missing address or token ends the process right away
#[test]
fn test_missing_configuration_exits_with_error() {
    let cases: [&[(&str, &str)]; 3] = [
        &[],
        &[("TOKEN", "476e6b70343055483230644c53707a12")],
        &[("IP_ADDRESS", "127.0.0.1"), ("TOKEN", "")],
    ];

    for envs in cases {
        let started = Instant::now();
        let output = exporter()
            .envs(envs.iter().copied())
            .output()
            .expect("Should run the binary");

        assert_eq!(output.status.code(), Some(1), "env: {:?}", envs);
        assert!(started.elapsed() < Duration::from_secs(10));
        // the banner is printed only once serving starts
        assert!(!String::from_utf8_lossy(&output.stdout).contains("Roborock Exporter"));
    }
}

const TOKEN: &str = "476e6b70343055483230644c53707a12";

/// Kills the exporter when the test ends, even on a failed assertion.
struct Running(Option<Child>);

impl Running {
    fn start(command: &mut Command) -> Self {
        let child = command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Should start the binary");
        Self(Some(child))
    }

    fn stop(mut self) -> String {
        let mut child = self.0.take().unwrap();
        child.kill().unwrap();
        let output = child.wait_with_output().unwrap();
        String::from_utf8_lossy(&output.stderr).into_owned()
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// No device answers on localhost, so every poll fails.
fn unreachable_vacuum(port: u16) -> Command {
    let mut command = exporter();
    command
        .env_remove("RUST_LOG")
        .env("IP_ADDRESS", "127.0.0.1")
        .env("TOKEN", TOKEN)
        .env("EXPORTER_PORT", port.to_string())
        .env("POLLING_INTERVAL_SECONDS", "1")
        .env("DEVICE_TIMEOUT_SECONDS", "1")
        .args(["--host", "127.0.0.1"]);
    command
}

fn scrape(port: u16) -> Option<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).ok()?;
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).ok()?;
    Some(response)
}

fn scrape_when_ready(port: u16) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(response) = scrape(port) {
            return response;
        }
        assert!(Instant::now() < deadline, "metrics endpoint never came up");
        thread::sleep(Duration::from_millis(100));
    }
}

/// Test that a failed cycle is logged without RUST_LOG or any flag
#[test]
fn test_poll_failures_are_logged_by_default() {
    let running = Running::start(&mut unreachable_vacuum(free_port()));
    thread::sleep(Duration::from_millis(4500));
    let stderr = running.stop();

    let warnings = stderr.matches("Failed to poll vacuum").count();
    // one cycle per second from POLLING_INTERVAL_SECONDS, not the 30s default
    assert!(warnings >= 2, "expected repeated warnings, stderr: {}", stderr);
    // info is below the default level
    assert!(!stderr.contains("Polling vacuum every"), "stderr: {}", stderr);
}

/// Test that EXPORTER_PORT picks the port serving all gauges
#[test]
fn test_metrics_served_on_configured_port() {
    let port = free_port();
    let running = Running::start(&mut unreachable_vacuum(port));

    let response = scrape_when_ready(port);
    running.stop();

    assert!(response.starts_with("HTTP/1.1 200"), "response: {}", response);
    for definition in DEFINITIONS {
        assert!(
            response.contains(&format!("# TYPE {} gauge", definition.name)),
            "{} missing",
            definition.name
        );
    }
    assert_eq!(response.matches("# TYPE roborock_").count(), DEFINITIONS.len());
}
