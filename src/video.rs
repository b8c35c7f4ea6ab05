use std::{path::Path, time::Duration};

use gstreamer::{
    prelude::{Cast, ElementExtManual, ObjectExt},
    traits::ElementExt,
    ElementFactory, MessageView,
};
use image::RgbImage;

use crate::source::{FrameSource, VideoMetadata};

const STATE_TIMEOUT: Duration = Duration::from_secs(10);

struct PlaybinInner {
    pipeline: gstreamer::Element,
    appsink: gstreamer_app::AppSink,
}

impl PlaybinInner {
    fn set_state_with_timeout(
        &self,
        state: gstreamer::State,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        match self.pipeline.set_state(state)? {
            gstreamer::StateChangeSuccess::Success => Ok(()),
            gstreamer::StateChangeSuccess::Async => self.wait_async_done(timeout),
            gstreamer::StateChangeSuccess::NoPreroll => {
                Err(anyhow::anyhow!("live sources not supported"))
            }
        }
    }

    fn wait_async_done(&self, timeout: Duration) -> anyhow::Result<()> {
        let bus = self
            .pipeline
            .bus()
            .ok_or(anyhow::anyhow!("pipeline has no bus"))?;

        loop {
            let msg = bus.timed_pop(Some(timeout.try_into()?));

            if let Some(msg) = msg {
                match msg.view() {
                    MessageView::AsyncDone(_) => return Ok(()),
                    MessageView::Error(err) => return Err(err.error().into()),
                    _ => {}
                }
            } else {
                return Err(anyhow::anyhow!("Timed out waiting for ASYNC_DONE"));
            }
        }
    }
}

impl Drop for PlaybinInner {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            tracing::warn!("failed to release video pipeline: {}", e);
        }
    }
}

/// An opened video, seekable by frame index.
///
/// This owns the one decoder cursor for the file; every read goes through `&mut self`.
/// The gstreamer pipeline is torn down when the sequence is dropped.
///
/// Seeking is time-based and assumes a constant frame rate:
/// - the frame count is derived from duration and frame rate, and may "overshoot"
/// - variable frame rate footage may yield skipped or duplicated frames
pub struct VideoSequence {
    inner: PlaybinInner,

    per_frame: Duration,
    frames: u64,
    width: u32,
    height: u32,
    frame_rate: f64,
    current_index: u64,
}

impl VideoSequence {
    /// Open a video file and preroll a gstreamer playbin on it.
    ///
    /// Fails when the file is missing, is not a video, or the required
    /// gstreamer plugins are not installed.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let uri = format!(
            "file://{}",
            path.as_ref()
                .canonicalize()?
                .to_str()
                .ok_or(anyhow::anyhow!("path cannot be a string"))?
        );

        // repeated calls are no-ops
        gstreamer::init()?;

        let pipeline = ElementFactory::make("playbin", None)?;

        pipeline.set_property("uri", uri)?;
        pipeline.set_property(
            "audio-sink",
            ElementFactory::make("fakesink", Some("fakeaudio"))?,
        )?;

        let videocaps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();

        let appsink = ElementFactory::make("appsink", None)
            .map_err(|_| anyhow::anyhow!("appsink is missing"))?
            .dynamic_cast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow::anyhow!("sink element is not an appsink"))?;

        appsink.set_property("caps", videocaps)?;
        pipeline.set_property("video-sink", appsink.clone())?;

        let inner = PlaybinInner { pipeline, appsink };

        inner.set_state_with_timeout(gstreamer::State::Paused, STATE_TIMEOUT)?;

        let sample = inner.appsink.pull_preroll()?;

        let caps = sample
            .caps_owned()
            .ok_or(anyhow::anyhow!("No data in video"))?;

        let struc = caps
            .structure(0)
            .ok_or(anyhow::anyhow!("preroll caps carry no structure"))?;

        let fraction: gstreamer::Fraction = struc
            .get("framerate")
            .map_err(|_| anyhow::anyhow!("Could not determine frame rate for seeking"))?;

        let num = *fraction.0.numer();
        let denom = *fraction.0.denom();

        if num <= 0 || denom <= 0 {
            return Err(anyhow::anyhow!("video reports frame rate {}/{}", num, denom));
        }

        let width: i32 = struc.get("width")?;
        let height: i32 = struc.get("height")?;

        let g_sec: Duration = gstreamer::ClockTime::SECOND.into();

        let per_frame: Duration = g_sec.mul_f64(denom as f64).div_f64(num as f64);

        let duration: gstreamer::ClockTime = inner
            .pipeline
            .query_duration()
            .ok_or(anyhow::anyhow!("Could not determine duration of video"))?;

        let duration: Duration = duration.into();

        let frames = (duration.as_nanos() / per_frame.as_nanos()) as u64;

        tracing::debug!(
            "opened {}x{} video, {} frames at {}/{} fps",
            width,
            height,
            frames,
            num,
            denom
        );

        let mut s = Self {
            inner,
            per_frame,
            frames,
            width: width as u32,
            height: height as u32,
            frame_rate: num as f64 / denom as f64,
            current_index: 0,
        };

        if s.frames > 0 {
            s.raw_seek(0)?;
        }

        Ok(s)
    }

    fn raw_seek(&mut self, index: u64) -> anyhow::Result<()> {
        use gstreamer::{ClockTime, SeekFlags, SeekType};

        if index >= self.frames {
            return Err(anyhow::anyhow!(
                "frame {} is past the end of the video ({} frames)",
                index,
                self.frames
            ));
        }

        let timestamp: ClockTime = self.per_frame.mul_f64(index as f64).try_into()?;

        let flags = SeekFlags::ACCURATE | SeekFlags::FLUSH;

        self.inner
            .pipeline
            .seek(
                1.0,
                flags,
                SeekType::Set,
                timestamp,
                SeekType::None,
                ClockTime::ZERO,
            )
            .map_err(|e| anyhow::anyhow!("seek event not handled: {}", e))?;

        self.inner.wait_async_done(STATE_TIMEOUT)?;

        self.current_index = index;

        Ok(())
    }

    fn step(&mut self, count: u64) -> anyhow::Result<()> {
        if count == 0 {
            return Ok(());
        }

        use gstreamer::ClockTime;

        let step_dur: ClockTime = self.per_frame.mul_f64(count as f64).try_into()?;

        let ev = gstreamer::event::Step::new(step_dur, 1.0, true, false);

        if !self.inner.pipeline.send_event(ev) {
            return Err(anyhow::anyhow!("Step event not handled"));
        }

        self.inner.wait_async_done(STATE_TIMEOUT)?;

        self.current_index += count;

        Ok(())
    }

    fn seek(&mut self, index: u64) -> anyhow::Result<()> {
        if index >= self.frames {
            return self.raw_seek(index);
        }

        match index.checked_sub(self.current_index) {
            Some(0) => Ok(()),
            Some(1) => self.step(1),
            _ => self.raw_seek(index),
        }
    }

    /// Grab the frame at `index`, see struct documentation for caveats.
    ///
    /// Returns `Ok(None)` when the preroll sample at that position carries no buffer.
    pub fn get_frame(&mut self, index: u64) -> anyhow::Result<Option<RgbImage>> {
        self.seek(index)?;

        let sample = self.inner.appsink.pull_preroll()?;

        if sample.buffer().is_none() {
            return Ok(None);
        }

        convert_sample_to_image(sample).map(Some)
    }

    /// Assumed amount of frames in this sequence, see struct documentation for caveats.
    pub fn len(&self) -> u64 {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            total_frames: self.frames,
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        }
    }
}

impl FrameSource for VideoSequence {
    fn metadata(&self) -> VideoMetadata {
        VideoSequence::metadata(self)
    }

    fn frame(&mut self, index: u64) -> anyhow::Result<RgbImage> {
        self.get_frame(index)?
            .ok_or_else(|| anyhow::anyhow!("got empty image on {}", index))
    }
}

/// Turn a prerolled RGB sample into a frame.
fn convert_sample_to_image(sample: gstreamer::Sample) -> anyhow::Result<RgbImage> {
    let info = sample
        .caps()
        .and_then(|caps| caps.structure(0))
        .ok_or(anyhow::anyhow!("sample carries no caps"))?;

    let format: String = info.get("format")?;
    if format != "RGB" {
        return Err(anyhow::anyhow!("expected an RGB sample, got {}", format));
    }

    let width: i32 = info.get("width")?;
    let height: i32 = info.get("height")?;

    let data = sample
        .buffer()
        .ok_or(anyhow::anyhow!("sample carries no buffer"))?
        .map_readable()
        .map_err(|_| anyhow::anyhow!("frame buffer is not readable"))?;

    frame_from_padded_rgb(width as u32, height as u32, &data).ok_or_else(|| {
        anyhow::anyhow!(
            "{} byte buffer is too small for a {}x{} frame",
            data.len(),
            width,
            height
        )
    })
}

/// Build a frame from packed RGB rows, each padded up to a multiple of 4 bytes.
///
/// Tightly packed input (no padding) is accepted as well.
fn frame_from_padded_rgb(width: u32, height: u32, data: &[u8]) -> Option<RgbImage> {
    let row = width as usize * 3;
    let stride = (row + 3) & !3;
    let rows = height as usize;

    let pixels = if stride != row && data.len() >= stride * rows {
        data.chunks_exact(stride)
            .take(rows)
            .flat_map(|line| &line[..row])
            .copied()
            .collect()
    } else {
        data.get(..row * rows)?.to_vec()
    };

    RgbImage::from_raw(width, height, pixels)
}
