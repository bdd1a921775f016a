//! Compiler trait and adapters
//!
//! A compiler turns the concatenated source of a block's assets into the
//! bytes of the artifact. Minification itself is always delegated to an
//! external tool; this crate only knows the contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Trait for compilation backends
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Compile concatenated source bytes. No partial output on failure.
    async fn compile(&self, source: Vec<u8>) -> Result<Vec<u8>>;
}

/// Compiler configuration from YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompilerConfig {
    /// Bundle without transforming
    #[default]
    Passthrough,

    /// Pipe the source through an external program
    Command(CommandCompilerConfig),
}

/// External command compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandCompilerConfig {
    /// Program to run (looked up on `PATH`)
    pub program: String,

    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
}

impl CompilerConfig {
    /// Build the configured compiler
    pub fn build(&self) -> Arc<dyn Compiler> {
        match self {
            Self::Passthrough => Arc::new(PassthroughCompiler),
            Self::Command(cmd) => Arc::new(CommandCompiler::new(&cmd.program, cmd.args.clone())),
        }
    }
}

// ============================================================================
// Passthrough
// ============================================================================

/// Returns the concatenated source unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

#[async_trait]
impl Compiler for PassthroughCompiler {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn compile(&self, source: Vec<u8>) -> Result<Vec<u8>> {
        Ok(source)
    }
}

// ============================================================================
// External command
// ============================================================================

/// Pipes the source into a minifier process and reads its stdout
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    /// Create a command compiler
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Compiler {
            compiler: self.program.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    async fn compile(&self, source: Vec<u8>) -> Result<Vec<u8>> {
        tracing::debug!(
            "Running {} {:?} on {} bytes",
            self.program,
            self.args,
            source.len()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(format!("failed to spawn: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.error("stdin not captured"))?;

        // Feed stdin concurrently with draining stdout so large inputs
        // cannot deadlock on a full pipe.
        let writer = async move {
            let result = stdin.write_all(&source).await;
            drop(stdin);
            result
        };
        let (written, output) = tokio::join!(writer, child.wait_with_output());

        let output = output.map_err(|e| self.error(format!("failed to wait: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.error(format!("exited with {}: {}", output.status, stderr.trim())));
        }
        written.map_err(|e| self.error(format!("failed to write stdin: {}", e)))?;

        Ok(output.stdout)
    }
}
