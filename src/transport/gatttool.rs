//! `gatttool` backend.
//!
//! Runs the BlueZ `gatttool` command line tool once per exchange. The tool
//! is killed when an exchange future is dropped, so the caller's timeout
//! also bounds the child process.

use super::{ENABLE_NOTIFICATIONS, ExchangeFuture, Transport, TransportError};
use crate::mac_address::MacAddress;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Line `gatttool` prints after the notification enable write succeeded.
const WRITE_ACK: &str = "Characteristic value was written successfully";

/// Transport backed by the `gatttool` binary.
#[derive(Debug, Clone)]
pub struct Gatttool {
    program: String,
}

impl Default for Gatttool {
    fn default() -> Self {
        Self::new("gatttool")
    }
}

impl Gatttool {
    /// Use `program` instead of the `gatttool` found on `PATH`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, mac: MacAddress) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-b")
            .arg(mac.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    async fn listen(&self, mac: MacAddress, handle: u16) -> Result<String, TransportError> {
        let mut child = self
            .command(mac)
            .arg("--char-write-req")
            .arg(format!("--handle=0x{handle:02x}"))
            .args(["-n", ENABLE_NOTIFICATIONS, "--listen"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.spawn_error(source))?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() || line == WRITE_ACK {
                    continue;
                }
                // --listen never exits on its own
                let _ = child.kill().await;
                return Ok(line.to_string());
            }
        }

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            pipe.read_to_string(&mut stderr).await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(TransportError::Exit {
                program: self.program.clone(),
                status,
                stderr: stderr.trim().to_string(),
            });
        }

        Err(TransportError::NoResponse(mac))
    }

    async fn read(&self, mac: MacAddress, handle: u16) -> Result<String, TransportError> {
        let output = self
            .command(mac)
            .arg("--char-read")
            .arg(format!("--handle=0x{handle:02x}"))
            .output()
            .await
            .map_err(|source| self.spawn_error(source))?;

        if !output.status.success() {
            return Err(TransportError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Transport for Gatttool {
    fn notify_read(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_> {
        Box::pin(self.listen(mac, handle))
    }

    fn read_characteristic(&self, mac: MacAddress, handle: u16) -> ExchangeFuture<'_> {
        Box::pin(self.read(mac, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TEST_MAC;
    use crate::transport::{BATTERY_HANDLE, NOTIFY_HANDLE};

    // `echo` stands in for gatttool and prints back the arguments it got.

    #[tokio::test]
    async fn test_notify_read_returns_first_line() {
        let transport = Gatttool::new("echo");
        let line = transport.notify_read(TEST_MAC, NOTIFY_HANDLE).await.unwrap();
        assert_eq!(
            line,
            "-b 4C:65:A8:D0:0A:1B --char-write-req --handle=0x10 -n 0100 --listen"
        );
    }

    #[tokio::test]
    async fn test_read_characteristic_returns_output() {
        let transport = Gatttool::new("echo");
        let line = transport
            .read_characteristic(TEST_MAC, BATTERY_HANDLE)
            .await
            .unwrap();
        assert_eq!(line, "-b 4C:65:A8:D0:0A:1B --char-read --handle=0x18");
    }

    #[tokio::test]
    async fn test_failing_tool_is_exit_error() {
        let transport = Gatttool::new("false");
        let err = transport
            .notify_read(TEST_MAC, NOTIFY_HANDLE)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Exit { .. }), "{err:?}");

        let err = transport
            .read_characteristic(TEST_MAC, BATTERY_HANDLE)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Exit { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_silent_tool_is_no_response() {
        let transport = Gatttool::new("true");
        let err = transport
            .notify_read(TEST_MAC, NOTIFY_HANDLE)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NoResponse(mac) if mac == TEST_MAC));
    }

    #[tokio::test]
    async fn test_missing_tool_is_spawn_error() {
        let transport = Gatttool::new("/nonexistent/gatttool");
        let err = transport
            .read_characteristic(TEST_MAC, BATTERY_HANDLE)
            .await
            .unwrap_err();
        assert!(
            err.to_string().starts_with("cannot run /nonexistent/gatttool"),
            "{err}"
        );
    }
}
