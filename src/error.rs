use thiserror::Error;

/// Errors that can surface from the invoice processing pipeline.
///
/// Extraction-side failures (`Document`, `ResponseParse`, `MissingField`,
/// `Validation`) always reach the caller. Risk assessment recovers from
/// every failure locally and never returns one of these.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document extraction failed: {message}")]
    Document { message: String },

    #[error("LLM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse LLM response: {message}")]
    ResponseParse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invoice validation failed: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation {
            message: message.into(),
        }
    }

    pub fn response_parse(message: impl Into<String>) -> Self {
        PipelineError::ResponseParse {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
