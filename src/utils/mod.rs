pub mod file;
pub mod host;

pub use file::FileUtils;
pub use host::hostname;
