pub mod config;
pub mod error;
pub mod types;

pub use config::ProjectConfig;
pub use error::{RoiError, RoiResult};
