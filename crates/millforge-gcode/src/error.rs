//! Error types for G-code generation.

use thiserror::Error;

/// Errors that can occur while writing a program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PostError {
    /// Tool number that cannot be loaded by `M6`.
    #[error("tool T{0} cannot be loaded")]
    UnknownTool(u32),

    /// A move carries a NaN or infinite coordinate or feed.
    #[error("move {move_index} has a non-finite coordinate or feed")]
    NonFinite {
        /// Index of the move in the whole program.
        move_index: usize,
    },

    /// The compiled job contains no moves.
    #[error("program has no moves")]
    EmptyProgram,
}

/// Result type for G-code generation.
pub type Result<T> = std::result::Result<T, PostError>;
