//! Action backends: how input lands on the target.

mod adb;
pub use adb::AdbInput;

#[cfg(feature = "desktop")]
mod mouse;
#[cfg(feature = "desktop")]
pub use mouse::MouseInput;
