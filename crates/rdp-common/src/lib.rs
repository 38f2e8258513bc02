//! RDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the RDP workspace.
//!
//! # Overview
//!
//! This crate provides the pieces every RDP component needs regardless of
//! which pipeline stage it implements:
//!
//! - **Error Handling**: the shared [`RdpError`] type and `Result` alias
//! - **Logging**: `tracing`-based logging configuration and initialization

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{RdpError, Result};
