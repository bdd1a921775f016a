//! minblock Core Library
//!
//! This crate provides the core functionality for minblock:
//! - Build block model and extraction from HTML documents
//! - Compiler contract and adapters
//! - Block processors and the processor registry
//! - Document rewriting
//! - Configuration parsing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Document   │────▶│  Extractor  │────▶│  Processor  │────▶│  Rewriter   │
//! │   (HTML)    │     │  (Blocks)   │     │ + Compiler  │     │  (HTML)     │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use minblock_core::{extract, rewrite};
//!
//! let blocks = extract(&document)?;
//! // ... process blocks ...
//! let output = rewrite(&document, &blocks)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assets;
pub mod block;
pub mod compiler;
pub mod config;
pub mod error;
pub mod extractor;
pub mod processor;
pub mod rewriter;

pub use block::{Block, BlockError, BlockOutput, BlockState};
pub use compiler::{Compiler, CompilerConfig};
pub use config::Config;
pub use error::{Error, Result};
pub use extractor::extract;
pub use processor::{BlockProcessor, ProcessorRegistry, RegexBlockProcessor};
pub use rewriter::rewrite;
