use thiserror::Error;

#[derive(Debug, Error)]
pub enum PixelArtError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("point ({x}, {y}) lies outside the {width}x{height} image")]
    PointOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("no sample point with id {0}")]
    UnknownSamplePoint(u64),

    #[error("invalid hex color `{0}`")]
    InvalidColor(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = PixelArtError> = std::result::Result<T, E>;

impl PixelArtError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
