//! Frame sources: where pixels come from.

mod adb;
pub use adb::AdbFrameSource;

#[cfg(feature = "desktop")]
mod screen;
#[cfg(feature = "desktop")]
pub use screen::ScreenSource;

#[cfg(feature = "desktop")]
mod window;
#[cfg(feature = "desktop")]
pub use window::WindowSource;
