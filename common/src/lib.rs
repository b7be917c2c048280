pub mod file_format;
pub mod log_setup;
pub mod parallel;
pub mod serde_format;

pub use file_format::{FileExtensionError, FileFormat};
pub use serde_format::{deserialize, serialize, SerdeFormatError, SerdeFormatResult};
