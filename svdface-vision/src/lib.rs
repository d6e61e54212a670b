pub mod descriptor;
pub mod preprocess;
#[cfg(feature = "camera")]
pub mod video;

// Re-export commonly used types
pub use descriptor::{extract, Descriptor, ExtractorConfig};
#[cfg(feature = "camera")]
pub use video::Camera;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("invalid input image: {0}")]
    InvalidInput(String),

    #[error("singular value decomposition did not produce left singular vectors")]
    Decomposition,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
