//! Async wrapper over the `adb` binary.
//!
//! The `adb` executable is the protocol boundary: every device interaction
//! is a subprocess invocation. Frames come from `exec-out screencap` in its
//! raw RGBA8888 format, which needs no image codec to parse; input goes
//! through `shell input`.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use tapflow_types::frame::Frame;

/// How long any single adb invocation may take before it is abandoned.
const ADB_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from driving the `adb` binary.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("adb {command} timed out after {}s", ADB_TIMEOUT.as_secs())]
    Timeout { command: String },

    #[error("adb {command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("could not parse adb output: {0}")]
    Parse(String),
}

/// One Android device reported by `adb devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbDevice {
    pub serial: String,
    /// adb's state column: `device`, `offline`, `unauthorized`.
    pub state: String,
}

/// Handle to one device through the `adb` binary.
#[derive(Debug, Clone)]
pub struct AdbClient {
    binary: String,
    /// Serial passed as `-s`; omitted means the only connected device.
    device: Option<String>,
}

impl AdbClient {
    pub fn new(binary: impl Into<String>, device: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            device,
        }
    }

    /// List connected devices (`adb devices`).
    pub async fn devices(&self) -> Result<Vec<AdbDevice>, AdbError> {
        let output = self.run(&["devices"]).await?;
        Ok(parse_devices(&String::from_utf8_lossy(&output)))
    }

    /// Logical screen resolution (`adb shell wm size`), as (width, height).
    ///
    /// Prefers the override size when one is set, matching what the device
    /// actually renders.
    pub async fn screen_size(&self) -> Result<(u32, u32), AdbError> {
        let output = self.run(&["shell", "wm", "size"]).await?;
        parse_wm_size(&String::from_utf8_lossy(&output))
    }

    /// Tap at an absolute device coordinate.
    pub async fn tap(&self, x: i32, y: i32) -> Result<(), AdbError> {
        debug!(x, y, "adb tap");
        self.run(&["shell", "input", "tap", &x.to_string(), &y.to_string()])
            .await?;
        Ok(())
    }

    /// Swipe from one coordinate to another over `duration_ms`.
    pub async fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration_ms: u64,
    ) -> Result<(), AdbError> {
        debug!(?from, ?to, duration_ms, "adb swipe");
        self.run(&[
            "shell",
            "input",
            "swipe",
            &from.0.to_string(),
            &from.1.to_string(),
            &to.0.to_string(),
            &to.1.to_string(),
            &duration_ms.to_string(),
        ])
        .await?;
        Ok(())
    }

    /// Long press: a swipe that stays in place.
    pub async fn long_press(&self, x: i32, y: i32, duration_ms: u64) -> Result<(), AdbError> {
        self.swipe((x, y), (x, y), duration_ms).await
    }

    /// Capture the screen as a grayscale frame.
    ///
    /// Uses `exec-out screencap` (no PNG flag), which emits a small header
    /// followed by raw RGBA8888 pixels.
    pub async fn screencap(&self) -> Result<Frame, AdbError> {
        let raw = self.run(&["exec-out", "screencap"]).await?;
        parse_raw_screencap(&raw)
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, AdbError> {
        let mut command = Command::new(&self.binary);
        if let Some(device) = &self.device {
            command.arg("-s").arg(device);
        }
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let label = args.join(" ");
        let child = command.spawn().map_err(|source| AdbError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        let output = tokio::time::timeout(ADB_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| AdbError::Timeout {
                command: label.clone(),
            })?
            .map_err(|source| AdbError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AdbError::CommandFailed {
                command: label,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

fn parse_devices(output: &str) -> Vec<AdbDevice> {
    output
        .lines()
        .skip(1) // "List of devices attached"
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(AdbDevice {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Parse `wm size` output:
///
/// ```text
/// Physical size: 1080x2400
/// Override size: 720x1600
/// ```
fn parse_wm_size(output: &str) -> Result<(u32, u32), AdbError> {
    let mut physical = None;
    let mut overridden = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Physical size:") {
            physical = parse_dimensions(rest.trim());
        } else if let Some(rest) = line.strip_prefix("Override size:") {
            overridden = parse_dimensions(rest.trim());
        }
    }
    overridden
        .or(physical)
        .ok_or_else(|| AdbError::Parse(format!("no size in wm output: {output:?}")))
}

fn parse_dimensions(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Parse the raw screencap wire format into a grayscale frame.
///
/// Layout: `u32 width, u32 height, u32 format` (little endian), then on
/// newer Android an extra `u32 colorspace`, then `width * height * 4` bytes
/// of RGBA8888. The header variant is disambiguated by the payload length.
fn parse_raw_screencap(raw: &[u8]) -> Result<Frame, AdbError> {
    const RGBA_8888: u32 = 1;

    if raw.len() < 12 {
        return Err(AdbError::Parse(format!(
            "screencap output too short: {} bytes",
            raw.len()
        )));
    }
    let width = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let height = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let format = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
    if format != RGBA_8888 {
        return Err(AdbError::Parse(format!(
            "unsupported screencap pixel format {format}"
        )));
    }

    let pixel_bytes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| AdbError::Parse(format!("implausible dimensions {width}x{height}")))?;

    let pixels = match raw.len() - 12 {
        n if n == pixel_bytes => &raw[12..],
        n if n == pixel_bytes + 4 => &raw[16..], // colorspace word present
        n => {
            return Err(AdbError::Parse(format!(
                "screencap payload holds {n} bytes, expected {pixel_bytes} for {width}x{height}"
            )));
        }
    };

    let gray: Vec<u8> = pixels.chunks_exact(4).map(rgba_to_gray).collect();
    Frame::new(width, height, gray).map_err(|e| AdbError::Parse(e.to_string()))
}

/// ITU-R BT.601 luma, integer arithmetic.
fn rgba_to_gray(rgba: &[u8]) -> u8 {
    let r = rgba[0] as u32;
    let g = rgba[1] as u32;
    let b = rgba[2] as u32;
    ((r * 299 + g * 587 + b * 114) / 1000) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
