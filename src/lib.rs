pub mod config;
pub mod error;
pub mod matcher;
pub mod recognizer;
pub mod storage;

pub use error::{Error, Result};
pub use recognizer::{Recognizer, Timings, Verification};

// Re-export vision types for convenience
pub use svdface_vision::{descriptor, preprocess, Descriptor, ExtractorConfig};
