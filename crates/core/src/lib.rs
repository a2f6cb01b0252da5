//! Shared domain records, configuration, and error types for the CRM
//! segmentation backend.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{CrmError, CrmResult};
