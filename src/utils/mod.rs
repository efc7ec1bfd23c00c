pub mod file_helpers;
pub mod platform;

pub use file_helpers::*;
pub use platform::*;
