//! minblock Runtime
//!
//! This crate runs a build over one document.
//!
//! # Features
//!
//! - Fork-join dispatch: one task per build block, joined before rewriting
//! - Per-block failure isolation
//! - Atomic persistence of artifacts and the rewritten document
//!
//! # Usage
//!
//! ```rust,ignore
//! use minblock_runtime::{Pipeline, Settings};
//!
//! let pipeline = Pipeline::new(Settings::new("public"), registry);
//! let report = pipeline.run("public/index.html").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fs;

pub use dispatch::Dispatcher;
pub use engine::{Pipeline, RunReport, Settings};
pub use error::{Error, Result};
