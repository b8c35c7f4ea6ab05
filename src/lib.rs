//! Turn a video into a Lottie animation.
//!
//! A fixed number of evenly spaced frames is pulled from the video, each one is
//! JPEG-compressed and embedded as a base64 image asset, and every frame gets its
//! own single-frame image layer.
//!
//! ```no_run
//! # #[cfg(feature = "gst")]
//! # fn main() -> anyhow::Result<()> {
//! use vidlottie::{ConvertOptions, Pipeline, VideoSequence};
//!
//! let mut video = VideoSequence::open("clip.mp4")?;
//! let options = ConvertOptions::new(40);
//! let conversion = Pipeline::new(&mut video, &options, "project.json".into()).run()?;
//!
//! println!("{} frames written", conversion.produced);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "gst"))]
//! # fn main() {}
//! ```

pub mod config;
pub mod encode;
pub mod error;
pub mod logging;
pub mod lottie;
pub mod pipeline;
pub mod sampler;
pub mod source;
#[cfg(feature = "gst")]
pub mod video;

pub use config::{ConvertOptions, Inputs};
pub use error::{Error, Result};
pub use lottie::{assemble, LottieDocument};
pub use pipeline::{Conversion, Pipeline, Stage};
pub use sampler::sample;
pub use source::{FrameSource, VideoMetadata};
#[cfg(feature = "gst")]
pub use video::VideoSequence;
