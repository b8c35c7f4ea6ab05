use crate::error::{Error, Result};

/// Pick `desired` evenly spaced frame indices out of `total_frames`.
///
/// Index `i` is `floor(i * total_frames / desired)`. The first index is always 0,
/// the last frame is not necessarily included, and asking for more frames than
/// the video has yields repeated indices.
pub fn sample(total_frames: u64, desired: usize) -> Result<Vec<u64>> {
    if desired == 0 {
        return Err(Error::InputValidation(
            "the number of frames must be positive".into(),
        ));
    }

    if total_frames == 0 {
        return Err(Error::EmptyVideo);
    }

    let step = total_frames as f64 / desired as f64;

    Ok((0..desired)
        .map(|i| (i as f64 * step).floor() as u64)
        .collect())
}
