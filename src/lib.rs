pub mod api;
pub mod config;
pub mod error;
pub mod invoice;
pub mod llm;
pub mod llm_extract;
pub mod pdf_extract;
pub mod risk;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use llm::LlmClient;
