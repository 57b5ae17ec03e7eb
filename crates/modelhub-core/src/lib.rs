//! # modelhub-core
//!
//! Core crate for ModelHub. Contains configuration schemas, the layered
//! configuration loader, and the unified error system.
//!
//! This crate has **no** internal dependencies on other ModelHub crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
