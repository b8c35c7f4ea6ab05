//! Lottie document model and assembly.
//!
//! Only the subset needed for a flip-book of embedded images is modelled: one image
//! asset plus one single-frame image layer per sampled frame. Field order follows
//! the usual Lottie key order so the written JSON is stable and diffable.

use std::{
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    error::{Error, Result},
    source::VideoMetadata,
};

pub const LOTTIE_VERSION: &str = "5.5.2";
pub const DEFAULT_NAME: &str = "@forresto/movie-to-lottie";

/// Layer type for image layers.
const LAYER_TYPE_IMAGE: u8 = 2;
const BLEND_MODE_NORMAL: u8 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LottieDocument {
    pub v: String,
    pub fr: f64,
    pub ip: u64,
    pub op: u64,
    pub w: u32,
    pub h: u32,
    pub nm: String,
    pub ddd: u8,
    pub assets: Vec<ImageAsset>,
    pub layers: Vec<ImageLayer>,
}

/// An embedded image, referenced from layers by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: String,
    pub w: u32,
    pub h: u32,
    /// Directory prefix, empty for embedded data.
    pub u: String,
    /// Path or data URI.
    pub p: String,
    /// 1 when `p` holds embedded data.
    pub e: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    pub ddd: u8,
    pub ind: u64,
    pub ty: u8,
    pub nm: String,
    pub cl: String,
    #[serde(rename = "refId")]
    pub ref_id: String,
    pub sr: u32,
    pub ks: LayerTransform,
    pub ao: u8,
    pub ip: u64,
    pub op: u64,
    pub st: u64,
    pub bm: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerTransform {
    pub o: StaticProperty<u32>,
    pub r: StaticProperty<u32>,
    pub p: StaticProperty<[f64; 3]>,
    pub a: StaticProperty<[f64; 3]>,
    pub s: StaticProperty<[u32; 3]>,
}

/// A non-animated property (`a: 0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticProperty<T> {
    pub a: u8,
    pub k: T,
    pub ix: u32,
}

impl<T> StaticProperty<T> {
    fn new(k: T, ix: u32) -> Self {
        Self { a: 0, k, ix }
    }
}

impl LayerTransform {
    /// Identity transform with position and anchor at the frame center.
    fn centered(width: u32, height: u32) -> Self {
        let center = [width as f64 / 2.0, height as f64 / 2.0, 0.0];

        Self {
            o: StaticProperty::new(100, 11),
            r: StaticProperty::new(0, 10),
            p: StaticProperty::new(center, 2),
            a: StaticProperty::new(center, 1),
            s: StaticProperty::new([100, 100, 100], 6),
        }
    }
}

pub fn asset_id(ordinal: usize) -> String {
    format!("fr_{}", ordinal)
}

/// Build the document for a sequence of encoded frames.
///
/// Frames are numbered densely by position in `frames`. `op` is the `requested` frame
/// count, which is larger than the layer count when extraction stopped early.
pub fn assemble(
    metadata: &VideoMetadata,
    frames: &[String],
    requested: usize,
    name: &str,
) -> LottieDocument {
    let (w, h) = (metadata.width, metadata.height);

    let mut assets = Vec::with_capacity(frames.len());
    let mut layers = Vec::with_capacity(frames.len());

    for (idx, data_uri) in frames.iter().enumerate() {
        let id = asset_id(idx);
        let idx = idx as u64;

        layers.push(ImageLayer {
            ddd: 0,
            ind: idx + 1,
            ty: LAYER_TYPE_IMAGE,
            nm: format!("{}.jpg", id),
            cl: "jpg".into(),
            ref_id: id.clone(),
            sr: 1,
            ks: LayerTransform::centered(w, h),
            ao: 0,
            ip: idx,
            op: idx + 1,
            st: idx,
            bm: BLEND_MODE_NORMAL,
        });

        assets.push(ImageAsset {
            id,
            w,
            h,
            u: String::new(),
            p: data_uri.clone(),
            e: 1,
        });
    }

    LottieDocument {
        v: LOTTIE_VERSION.into(),
        fr: metadata.frame_rate,
        ip: 0,
        op: requested as u64,
        w,
        h,
        nm: name.into(),
        ddd: 0,
        assets,
        layers,
    }
}

impl LottieDocument {
    /// Two-space indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the document to `path`.
    ///
    /// The JSON goes to a temporary file next to `path` which then replaces it,
    /// so a failed write leaves any previous file intact.
    pub fn write(&self, path: &Path) -> Result<()> {
        let to_write_error = |source: std::io::Error| Error::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let staged = NamedTempFile::new_in(dir).map_err(to_write_error)?;
        let mut writer = BufWriter::new(staged);

        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| to_write_error(e.into()))?;
        writer.flush().map_err(to_write_error)?;

        let staged = writer
            .into_inner()
            .map_err(|e| to_write_error(e.into_error()))?;
        staged.persist(path).map_err(|e| to_write_error(e.error))?;

        Ok(())
    }
}
