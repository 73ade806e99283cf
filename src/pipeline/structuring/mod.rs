pub mod types;
pub mod vocabulary;
pub mod sanitize;
pub mod normalize;
pub mod segment;
pub mod spans;
pub mod extract;
pub mod suggest;
pub mod confidence;
pub mod validation;
pub mod status;
pub mod render;
pub mod orchestrator;


pub use types::*;
pub use vocabulary::*;
pub use normalize::*;
pub use segment::*;
pub use extract::*;
pub use validation::*;
pub use status::*;
pub use render::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IhcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid marker vocabulary: {0}")]
    InvalidVocabulary(String),

    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidEnum { field: String, value: String },
}
