//! Template matching: locating a template image inside a captured frame.

mod ncc;
mod store;

pub use ncc::NccMatcher;
pub use store::TemplateStore;
