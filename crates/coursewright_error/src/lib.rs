//! Error types for Coursewright.
//!
//! This crate provides the foundation error types shared by every other
//! Coursewright crate.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! Errors that come back from a remote service ([`ModelError`], [`LmsError`])
//! implement [`RetryableError`], which is how the retry executor decides
//! between backing off, honoring a rate-limit hint and giving up.
//!
//! # Examples
//!
//! ```
//! use coursewright_error::{CoursewrightResult, StorageError, StorageErrorKind};
//!
//! fn load_checkpoint() -> CoursewrightResult<String> {
//!     Err(StorageError::new(StorageErrorKind::FileRead("rust-101.json".to_string())))?
//! }
//!
//! assert!(load_checkpoint().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;
mod json;
mod lms;
mod model;
mod retry;
mod storage;

pub use builder::{BuilderError, BuilderErrorKind};
pub use config::{ConfigError, ConfigErrorKind};
pub use error::{CoursewrightError, CoursewrightErrorKind, CoursewrightResult};
pub use json::JsonError;
pub use lms::{LmsError, LmsErrorKind};
pub use model::{ModelError, ModelErrorKind};
pub use retry::{RetryDisposition, RetryableError, parse_retry_after};
pub use storage::{StorageError, StorageErrorKind};
