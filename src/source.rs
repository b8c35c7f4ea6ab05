use image::RgbImage;

/// Properties of the source video, read once when it is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// Anything that can hand out decoded frames by index.
///
/// Implementors hold a single decoder cursor, so reads take `&mut self` and happen one at a time.
pub trait FrameSource {
    fn metadata(&self) -> VideoMetadata;

    /// Decode the frame at `index`. An error means the frame is unreadable.
    fn frame(&mut self, index: u64) -> anyhow::Result<RgbImage>;
}
