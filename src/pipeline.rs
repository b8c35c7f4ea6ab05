//! The conversion run as an explicit state machine.
//!
//! ```text
//! Init -> Sampling -> Extracting(0) -> Encoding(0) -> Extracting(1) -> ... -> Assembling -> Writing -> Done
//! ```
//!
//! A frame that fails to decode or encode ends extraction for good: the remaining
//! samples are skipped and the frames gathered so far go on to `Assembling`.
//! Assembling with no frames at all ends in `Aborted`, as does any failure while
//! sampling or writing.

use std::path::PathBuf;

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
    config::ConvertOptions,
    encode::{encode_jpeg, to_data_uri},
    error::{Error, Result},
    lottie::{assemble, LottieDocument},
    sampler::sample,
    source::{FrameSource, VideoMetadata},
};

#[derive(Debug)]
pub enum Stage {
    Init,
    Sampling,
    /// About to read the sample at this position.
    Extracting(usize),
    Encoding {
        position: usize,
        index: u64,
        frame: RgbImage,
    },
    Assembling,
    Writing(LottieDocument),
    Done(PathBuf),
    Aborted(Error),
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done(_) | Stage::Aborted(_))
    }
}

/// Outcome of a run that produced a file.
#[derive(Debug)]
pub struct Conversion {
    pub output: PathBuf,
    pub requested: usize,
    pub produced: usize,
    /// Why extraction stopped before every sample was read, if it did.
    pub halted: Option<Error>,
}

impl Conversion {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

pub struct Pipeline<'a, S: FrameSource> {
    source: &'a mut S,
    options: &'a ConvertOptions,
    output: PathBuf,
    metadata: VideoMetadata,

    indices: Vec<u64>,
    frames: Vec<String>,
    halted: Option<Error>,
    stage: Stage,
}

impl<'a, S: FrameSource> Pipeline<'a, S> {
    pub fn new(source: &'a mut S, options: &'a ConvertOptions, output: PathBuf) -> Self {
        let metadata = source.metadata();

        Self {
            source,
            options,
            output,
            metadata,
            indices: Vec::new(),
            frames: Vec::new(),
            halted: None,
            stage: Stage::Init,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Source frame indices chosen by the sampler, empty before `Sampling` ran.
    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    /// Number of frames encoded so far.
    pub fn produced(&self) -> usize {
        self.frames.len()
    }

    /// Perform one transition. Terminal stages stay put.
    pub fn advance(&mut self) {
        let stage = std::mem::replace(&mut self.stage, Stage::Init);

        self.stage = match stage {
            Stage::Init => Stage::Sampling,
            Stage::Sampling => self.sample(),
            Stage::Extracting(position) => self.extract(position),
            Stage::Encoding {
                position,
                index,
                frame,
            } => self.encode(position, index, &frame),
            Stage::Assembling => self.assemble(),
            Stage::Writing(document) => self.write(&document),
            terminal @ (Stage::Done(_) | Stage::Aborted(_)) => terminal,
        };
    }

    /// Drive the pipeline to completion.
    pub fn run(mut self) -> Result<Conversion> {
        loop {
            match std::mem::replace(&mut self.stage, Stage::Init) {
                Stage::Done(output) => {
                    return Ok(Conversion {
                        output,
                        requested: self.options.frames,
                        produced: self.frames.len(),
                        halted: self.halted,
                    })
                }
                Stage::Aborted(err) => return Err(err),
                stage => {
                    self.stage = stage;
                    self.advance();
                }
            }
        }
    }

    fn sample(&mut self) -> Stage {
        match sample(self.metadata.total_frames, self.options.frames) {
            Ok(indices) => {
                info!(
                    "sampling {} of {} frames",
                    indices.len(),
                    self.metadata.total_frames
                );
                self.indices = indices;
                Stage::Extracting(0)
            }
            Err(err) => Stage::Aborted(err),
        }
    }

    fn extract(&mut self, position: usize) -> Stage {
        let index = match self.indices.get(position) {
            Some(&index) => index,
            None => return Stage::Assembling,
        };

        match self.source.frame(index) {
            Ok(frame) => Stage::Encoding {
                position,
                index,
                frame,
            },
            Err(err) => self.halt(Error::FrameExtraction {
                index,
                reason: format!("{:#}", err),
            }),
        }
    }

    fn encode(&mut self, position: usize, index: u64, frame: &RgbImage) -> Stage {
        match encode_jpeg(frame, self.options.quality) {
            Ok(jpeg) => {
                debug!(
                    "frame {} ({}/{}) encoded to {} bytes",
                    index,
                    position + 1,
                    self.indices.len(),
                    jpeg.len()
                );
                self.frames.push(to_data_uri(&jpeg));
                Stage::Extracting(position + 1)
            }
            Err(source) => self.halt(Error::FrameEncoding { index, source }),
        }
    }

    fn halt(&mut self, err: Error) -> Stage {
        warn!("{}. Aborting.", err);
        self.halted = Some(err);
        Stage::Assembling
    }

    fn assemble(&mut self) -> Stage {
        if self.frames.is_empty() {
            return Stage::Aborted(Error::NoFramesProduced {
                cause: self.halted.take().map(Box::new),
            });
        }

        if self.frames.len() < self.options.frames {
            warn!(
                "only {} of {} frames were captured, the document still declares {} frames",
                self.frames.len(),
                self.options.frames,
                self.options.frames
            );
        }

        Stage::Writing(assemble(
            &self.metadata,
            &self.frames,
            self.options.frames,
            &self.options.name,
        ))
    }

    fn write(&mut self, document: &LottieDocument) -> Stage {
        match document.write(&self.output) {
            Ok(()) => {
                info!(
                    "wrote {} layers to {}",
                    document.layers.len(),
                    self.output.display()
                );
                Stage::Done(self.output.clone())
            }
            Err(err) => Stage::Aborted(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct StubSource {
        total: u64,
        fail_at: Option<u64>,
        /// Too wide for a JPEG, so encoding it fails.
        oversized_at: Option<u64>,
        reads: Vec<u64>,
    }

    impl StubSource {
        fn new(total: u64) -> Self {
            Self {
                total,
                fail_at: None,
                oversized_at: None,
                reads: Vec::new(),
            }
        }
    }

    impl FrameSource for StubSource {
        fn metadata(&self) -> VideoMetadata {
            VideoMetadata {
                total_frames: self.total,
                width: 8,
                height: 4,
                frame_rate: 25.0,
            }
        }

        fn frame(&mut self, index: u64) -> anyhow::Result<RgbImage> {
            self.reads.push(index);

            if Some(index) == self.fail_at {
                anyhow::bail!("corrupt packet");
            }

            if Some(index) == self.oversized_at {
                return Ok(RgbImage::from_pixel(70_000, 1, Rgb([0, 0, 0])));
            }

            Ok(RgbImage::from_pixel(8, 4, Rgb([index as u8, 0, 0])))
        }
    }

    #[test]
    fn walks_through_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = StubSource::new(4);
        let options = ConvertOptions::new(2);
        let mut pipeline = Pipeline::new(&mut source, &options, dir.path().join("out.json"));

        assert!(matches!(pipeline.stage(), Stage::Init));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Sampling));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Extracting(0)));
        assert_eq!(pipeline.indices(), &[0, 2]);
        pipeline.advance();
        assert!(matches!(
            pipeline.stage(),
            Stage::Encoding {
                position: 0,
                index: 0,
                ..
            }
        ));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Extracting(1)));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Encoding { index: 2, .. }));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Extracting(2)));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Assembling));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Writing(_)));
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Done(_)));
        assert!(pipeline.stage().is_terminal());

        // terminal stages stay put
        pipeline.advance();
        assert!(matches!(pipeline.stage(), Stage::Done(_)));
        assert_eq!(pipeline.produced(), 2);
    }

    #[test]
    fn failed_frame_stops_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = StubSource::new(10);
        source.fail_at = Some(6);
        let options = ConvertOptions::new(5);

        let conversion = Pipeline::new(&mut source, &options, dir.path().join("out.json"))
            .run()
            .unwrap();

        assert_eq!(conversion.requested, 5);
        assert_eq!(conversion.produced, 3);
        assert!(!conversion.is_complete());
        assert!(matches!(
            conversion.halted,
            Some(Error::FrameExtraction { index: 6, .. })
        ));

        // index 8 is never attempted
        assert_eq!(source.reads, vec![0, 2, 4, 6]);
    }

    #[test]
    fn failed_encoding_stops_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let mut source = StubSource::new(4);
        source.oversized_at = Some(2);
        let options = ConvertOptions::new(4);

        let conversion = Pipeline::new(&mut source, &options, output.clone())
            .run()
            .unwrap();

        assert_eq!(conversion.produced, 2);
        assert!(matches!(
            conversion.halted,
            Some(Error::FrameEncoding { index: 2, .. })
        ));
        assert!(output.exists());

        // index 3 is never read
        assert_eq!(source.reads, vec![0, 1, 2]);
    }

    #[test]
    fn first_frame_failing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let mut source = StubSource::new(10);
        source.fail_at = Some(0);
        let options = ConvertOptions::new(5);

        let err = Pipeline::new(&mut source, &options, output.clone())
            .run()
            .unwrap_err();

        match err {
            Error::NoFramesProduced { cause: Some(cause) } => {
                assert!(matches!(*cause, Error::FrameExtraction { index: 0, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn empty_video_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = StubSource::new(0);
        let options = ConvertOptions::new(5);

        let err = Pipeline::new(&mut source, &options, dir.path().join("out.json"))
            .run()
            .unwrap_err();

        assert!(matches!(err, Error::EmptyVideo));
        assert!(source.reads.is_empty());
    }

    #[test]
    fn unwritable_output_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = StubSource::new(3);
        let options = ConvertOptions::new(3);
        let output = dir.path().join("missing").join("out.json");

        let err = Pipeline::new(&mut source, &options, output)
            .run()
            .unwrap_err();

        assert!(matches!(err, Error::Write { .. }));
    }
}
