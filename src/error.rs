use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a conversion.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("error opening the video file {}: {reason}", .path.display())]
    VideoOpen { path: PathBuf, reason: String },

    #[error("the video contains no usable frames or could not be read")]
    EmptyVideo,

    #[error("frame {index} could not be read: {reason}")]
    FrameExtraction { index: u64, reason: String },

    #[error("error encoding frame {index}: {source}")]
    FrameEncoding {
        index: u64,
        #[source]
        source: image::ImageError,
    },

    #[error("no frames were successfully processed")]
    NoFramesProduced {
        /// The failure that ended extraction before any frame was kept.
        #[source]
        cause: Option<Box<Error>>,
    },

    #[error("error writing the JSON file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
