//! Application configuration types for tapflow.
//!
//! `AppConfig` represents the top-level `tapflow.toml` that selects the
//! capture backend, ADB device, per-step fallback values, and run paths.
//! All fields have working defaults so the file is optional.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::geometry::TargetGeometry;

/// Top-level configuration, loaded from `tapflow.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub adb: AdbConfig,

    /// Geometry correction when the destination device's logical resolution
    /// differs from the captured frame. Omitted means no correction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetGeometry>,

    #[serde(default)]
    pub defaults: StepDefaults,

    #[serde(default)]
    pub run: RunConfig,
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Which frame source to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    /// Android device via the `adb` binary.
    #[default]
    Adb,
    /// Primary monitor. Requires the `desktop` feature.
    Screen,
    /// A single window located by title. Requires the `desktop` feature.
    Window,
}

/// Frame source selection and calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub backend: CaptureBackend,

    /// Title substring used to locate the window for the window backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,

    /// Captured-pixel to action-unit scale factor.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::default(),
            window_title: None,
            scale: default_scale(),
        }
    }
}

// ---------------------------------------------------------------------------
// ADB
// ---------------------------------------------------------------------------

/// How to reach the Android device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdbConfig {
    /// Device serial passed as `adb -s`. Omitted means the only connected
    /// device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Path to the `adb` binary.
    #[serde(default = "default_adb_binary")]
    pub binary: String,
}

fn default_adb_binary() -> String {
    "adb".to_string()
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            device: None,
            binary: default_adb_binary(),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-step fallbacks
// ---------------------------------------------------------------------------

/// Values the script loader applies to steps that omit them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefaults {
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds between match attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,

    /// Seconds of pause after each step's action.
    #[serde(default = "default_end_delay")]
    pub end_delay: f64,
}

fn default_threshold() -> f32 {
    defaults::MATCH_THRESHOLD
}

fn default_retries() -> u32 {
    defaults::MAX_ATTEMPTS
}

fn default_retry_delay() -> f64 {
    defaults::RETRY_DELAY_SECS
}

fn default_end_delay() -> f64 {
    defaults::END_DELAY_SECS
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            end_delay: default_end_delay(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run paths & pacing
// ---------------------------------------------------------------------------

/// Where scripts and templates live and how runs pace themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Hard upper bound on iterations of an `until` loop.
    #[serde(default = "default_loop_safety_cap")]
    pub loop_safety_cap: u32,

    /// Seconds between full plan cycles in loop mode.
    #[serde(default = "default_cycle_delay")]
    pub cycle_delay: f64,

    /// Where debug frame dumps are written when `--debug` is on.
    #[serde(default = "default_debug_dir")]
    pub debug_dir: PathBuf,
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_loop_safety_cap() -> u32 {
    defaults::LOOP_SAFETY_CAP
}

fn default_cycle_delay() -> f64 {
    defaults::CYCLE_DELAY_SECS
}

fn default_debug_dir() -> PathBuf {
    PathBuf::from(".tapflow-debug")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            templates_dir: default_templates_dir(),
            loop_safety_cap: default_loop_safety_cap(),
            cycle_delay: default_cycle_delay(),
            debug_dir: default_debug_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
