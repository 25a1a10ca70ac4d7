use crate::type_model::TypeId;

/// Public error type for every save/load entry point in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("failed to open image file: {0}")]
    FailedToOpenFile(#[source] std::io::Error),

    #[error("failed to read from image stream: {0}")]
    FailedToReadStream(#[source] std::io::Error),

    #[error("failed to write to image stream: {0}")]
    FailedToWriteStream(#[source] std::io::Error),

    #[error("image buffer of {available} bytes is too small for a payload of {required} bytes")]
    BufferTooSmall { available: usize, required: usize },

    #[error("image buffer at {address:#x} is not aligned to {required} bytes")]
    InvalidAlignment { address: usize, required: usize },

    #[error("image root is type {found:?}, expected {expected:?}")]
    ObjectOfWrongType { expected: TypeId, found: TypeId },

    #[error(
        "image session fingerprint does not match this process (image: {image:#x}, process: {process:#x})"
    )]
    SessionMismatch { image: u64, process: u64 },

    #[error("pointer fixup at offset {offset} targets address not covered by any chunk")]
    BadPointer { offset: u32 },

    #[error("type fixup references unknown type id {0}")]
    UnknownType(TypeId),

    #[error("asset fixup at offset {offset} could not resolve asset id {asset_id:?}")]
    UnresolvedAsset { offset: u32, asset_id: String },
}

impl From<std::io::Error> for ImageError {
    fn from(e: std::io::Error) -> Self {
        ImageError::FailedToReadStream(e)
    }
}

pub type Result<T> = std::result::Result<T, ImageError>;
