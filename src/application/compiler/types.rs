use thiserror::Error;

use crate::domain::document::CompiledDocument;

/// Structured errors surfaced by the compile pipeline. A failure is terminal
/// for the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("markdown formatting failed: {message}")]
    Markdown { message: String },
    #[error("unknown custom block `{name}` on line {line}")]
    UnknownBlock { name: String, line: usize },
    #[error("custom block `{name}` on line {line} has no body")]
    EmptyBlock { name: String, line: usize },
    #[error("custom block `{name}` opened on line {line} is never closed")]
    UnterminatedBlock { name: String, line: usize },
    #[error("compile task aborted: {message}")]
    Aborted { message: String },
}

impl CompileError {
    pub fn unknown_block(name: impl Into<String>, line: usize) -> Self {
        Self::UnknownBlock {
            name: name.into(),
            line,
        }
    }

    pub fn empty_block(name: impl Into<String>, line: usize) -> Self {
        Self::EmptyBlock {
            name: name.into(),
            line,
        }
    }

    pub fn unterminated_block(name: impl Into<String>, line: usize) -> Self {
        Self::UnterminatedBlock {
            name: name.into(),
            line,
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }
}

/// Rich-text transformation engine: markdown in, body HTML out.
pub trait MarkupEngine: Send + Sync {
    fn process(&self, markup: &str) -> Result<String, CompileError>;
}

/// Turns raw markup into a self-contained renderable document.
///
/// Implementations must not panic for any input string; failures are reported
/// through [`CompileError`].
pub trait DocumentCompiler: Send + Sync {
    fn compile(
        &self,
        markup: &str,
        style_override: Option<&str>,
    ) -> Result<CompiledDocument, CompileError>;
}
