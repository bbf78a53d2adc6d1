//! Infrastructure layer for tapflow.
//!
//! Implements the collaborator ports defined in `tapflow-core`: frame
//! sources (ADB screencap, desktop monitors and windows), the template
//! matcher (grayscale normalized cross-correlation), and input backends
//! (ADB taps, desktop mouse). Desktop backends sit behind the `desktop`
//! cargo feature.

pub mod adb;
pub mod capture;
pub mod debug;
pub mod input;
pub mod matcher;
