use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the renderer core and its surfaces.
///
/// Directions outside the field of view are not errors; they come back as
/// `ScreenPoint { valid: false, .. }` and are painted as background.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to parse {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("rendering surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }
}
