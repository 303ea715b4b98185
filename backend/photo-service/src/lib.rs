//! Photo Service
//!
//! HTTP service for the event photo gallery: authenticated uploads into the
//! object store, prefix-scoped listing, and on-the-fly image serving with
//! watermarking and an edge cache in front of the processing pipeline.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod models;
pub mod processing;
pub mod ratelimit;
pub mod storage;
pub mod validation;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
