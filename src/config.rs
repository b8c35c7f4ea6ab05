use std::path::{Path, PathBuf};

use crate::{
    encode::DEFAULT_JPEG_QUALITY,
    error::{Error, Result},
    lottie::DEFAULT_NAME,
};

pub const DEFAULT_FILE_NAME: &str = "project.json";

/// Knobs for a single conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Number of frames to sample from the video.
    pub frames: usize,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    /// Written as the document's `nm`.
    pub name: String,
    /// File name created inside the output directory.
    pub file_name: String,
}

impl ConvertOptions {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            quality: DEFAULT_JPEG_QUALITY,
            name: DEFAULT_NAME.into(),
            file_name: DEFAULT_FILE_NAME.into(),
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(Error::InputValidation(format!(
                "JPEG quality must be between 1 and 100, got {}",
                quality
            )));
        }

        self.quality = quality;
        Ok(self)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Checked user inputs: what to read, where to write, how many frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    pub frames: usize,
    pub input: PathBuf,
    pub output_dir: PathBuf,
}

impl Inputs {
    /// Validate raw user input before any video work starts.
    pub fn validate(frames: &str, input: &Path, output_dir: &Path) -> Result<Self> {
        let frames = parse_frame_count(frames)?;

        if !input.is_file() {
            return Err(Error::InputValidation(format!(
                "the specified MP4 file was not found: {}",
                input.display()
            )));
        }

        if !output_dir.is_dir() {
            return Err(Error::InputValidation(format!(
                "the specified target directory was not found: {}",
                output_dir.display()
            )));
        }

        Ok(Self {
            frames,
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_path(&self, options: &ConvertOptions) -> PathBuf {
        self.output_dir.join(&options.file_name)
    }
}

fn parse_frame_count(text: &str) -> Result<usize> {
    let count: i64 = text.trim().parse().map_err(|_| {
        Error::InputValidation(format!(
            "invalid number of frames {:?}, please enter an integer",
            text.trim()
        ))
    })?;

    if count <= 0 {
        return Err(Error::InputValidation(format!(
            "the number of frames must be positive, got {}",
            count
        )));
    }

    usize::try_from(count)
        .map_err(|_| Error::InputValidation(format!("too many frames requested: {}", count)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        fs::write(&video, b"not really a video").unwrap();
        (dir, video)
    }

    #[test]
    fn accepts_valid_inputs() {
        let (dir, video) = fixture();
        let inputs = Inputs::validate(" 40\n", &video, dir.path()).unwrap();

        assert_eq!(inputs.frames, 40);
        assert_eq!(
            inputs.output_path(&ConvertOptions::new(40)),
            dir.path().join("project.json")
        );
    }

    #[test]
    fn rejects_bad_frame_counts() {
        let (dir, video) = fixture();

        for text in ["abc", "4.5", "", "0", "-3"] {
            let err = Inputs::validate(text, &video, dir.path()).unwrap_err();
            assert!(matches!(err, Error::InputValidation(_)), "{:?}", text);
        }
    }

    #[test]
    fn rejects_missing_paths() {
        let (dir, video) = fixture();

        let missing_video = dir.path().join("nope.mp4");
        assert!(matches!(
            Inputs::validate("5", &missing_video, dir.path()),
            Err(Error::InputValidation(_))
        ));

        // a file is not a directory
        assert!(matches!(
            Inputs::validate("5", &video, &video),
            Err(Error::InputValidation(_))
        ));
    }

    #[test]
    fn quality_bounds() {
        assert_eq!(ConvertOptions::new(1).quality, 80);
        assert_eq!(ConvertOptions::new(1).with_quality(95).unwrap().quality, 95);
        assert!(ConvertOptions::new(1).with_quality(0).is_err());
        assert!(ConvertOptions::new(1).with_quality(101).is_err());
    }
}
