use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ColorType, ImageResult, RgbImage};

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Compress a frame to JPEG bytes.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();

    JpegEncoder::new_with_quality(&mut bytes, quality).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;

    Ok(bytes)
}

/// Wrap JPEG bytes into a `data:` URI suitable for an embedded Lottie image asset.
pub fn to_data_uri(jpeg: &[u8]) -> String {
    let mut uri = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    uri.push_str(JPEG_DATA_URI_PREFIX);
    BASE64_STANDARD.encode_string(jpeg, &mut uri);
    uri
}
