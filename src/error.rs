//! Error types for evolu

use thiserror::Error;

/// Evolu error type
#[derive(Debug, Error)]
pub enum EvoluError {
    /// Program text is not an Evolu envelope
    #[error("Malformed program: {0}")]
    MalformedProgram(String),

    /// Envelope names a language that was never registered
    #[error("Unknown Evolu language `{0}`")]
    UnknownLanguage(String),

    /// Rule DSL referenced a command the language does not define
    #[error("Unknown command `{command}` in language `{language}`")]
    UnknownCommand { language: String, command: String },

    /// Rule DSL command sits at an opcode slot a single byte cannot address
    #[error("Command `{command}` at slot {position} cannot be encoded as an opcode")]
    UnencodableCommand { command: String, position: usize },

    /// Rule DSL label cannot be written as a genome parameter
    #[error("Label `{label}` is not a parameter of command `{command}`")]
    UnencodableParam { command: String, label: String },
}

pub type Result<T> = std::result::Result<T, EvoluError>;
