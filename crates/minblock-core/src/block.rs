//! Build block model
//!
//! A block is one annotated region of a document:
//!
//! ```html
//! <!-- build:js js/app.min.js -->
//! <script src="js/a.js"></script>
//! <script src="js/b.js"></script>
//! <!-- endbuild -->
//! ```

use std::ops::Range;

use thiserror::Error;

/// Where the compiled output of a block goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutput {
    /// Write an artifact with this name (relative to the base path)
    File(String),
    /// Embed the compiled output in the document
    Inline,
}

impl BlockOutput {
    /// Interpret the output token of a start marker.
    ///
    /// A missing token, or one equal to `inline_token`, selects inline mode.
    pub fn from_token(token: Option<&str>, inline_token: &str) -> Self {
        match token {
            None => Self::Inline,
            Some(t) if t == inline_token => Self::Inline,
            Some(t) => Self::File(t.to_string()),
        }
    }

    /// Artifact file name, if any
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::File(name) => Some(name),
            Self::Inline => None,
        }
    }
}

/// Per-block processing failure. Never aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// No processor is registered for the block's type
    #[error("no block processor registered for type '{block_type}'")]
    NoProcessor {
        /// The unknown type tag
        block_type: String,
    },

    /// A referenced asset could not be read
    #[error("failed to read asset {path}: {message}")]
    AssetRead {
        /// Full path of the asset
        path: String,
        /// Underlying error
        message: String,
    },

    /// The compiler rejected the input or its backend failed
    #[error("compilation failed: {message}")]
    Compile {
        /// Description of the failure
        message: String,
    },

    /// The compiled artifact could not be written
    #[error("failed to write artifact {path}: {message}")]
    ArtifactWrite {
        /// Full path of the artifact
        path: String,
        /// Underlying error
        message: String,
    },

    /// Replacement markup could not be rendered
    #[error("failed to render replacement markup: {message}")]
    Render {
        /// Underlying error
        message: String,
    },

    /// Inline output must be text
    #[error("compiled output is not valid UTF-8 and cannot be inlined")]
    NonUtf8Inline,

    /// The processing task panicked
    #[error("block task panicked: {message}")]
    TaskPanicked {
        /// Panic description
        message: String,
    },
}

/// Processing state of a block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BlockState {
    /// Extracted, not processed yet
    #[default]
    Pending,
    /// Compiled successfully
    Compiled {
        /// Compiled bytes
        output: Vec<u8>,
        /// Markup that replaces the whole block range
        replacement: String,
    },
    /// Processing failed; the original markup is kept
    Failed(BlockError),
}

/// One annotated region of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Processor tag, e.g. `js` or `css`
    pub block_type: String,

    /// Byte range of the whole block, markers included
    pub range: Range<usize>,

    /// Declared output
    pub output: BlockOutput,

    /// Raw bytes between the start and end markers
    pub content: Vec<u8>,

    /// Asset references in document order
    pub asset_files: Vec<String>,

    /// Processing state
    pub state: BlockState,
}

impl Block {
    /// Create a pending block
    pub fn new(
        block_type: impl Into<String>,
        range: Range<usize>,
        output: BlockOutput,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            block_type: block_type.into(),
            range,
            output,
            content: content.into(),
            asset_files: Vec::new(),
            state: BlockState::Pending,
        }
    }

    /// Compiled output, present only after successful processing
    pub fn compiled_output(&self) -> Option<&[u8]> {
        match &self.state {
            BlockState::Compiled { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Replacement markup, present only after successful processing
    pub fn replacement(&self) -> Option<&str> {
        match &self.state {
            BlockState::Compiled { replacement, .. } => Some(replacement),
            _ => None,
        }
    }

    /// Processing error, if the block failed
    pub fn error(&self) -> Option<&BlockError> {
        match &self.state {
            BlockState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the block is in inline mode
    pub fn is_inline(&self) -> bool {
        self.output == BlockOutput::Inline
    }

    /// Mark the block as failed
    pub fn fail(&mut self, error: BlockError) {
        self.state = BlockState::Failed(error);
    }
}
