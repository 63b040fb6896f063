//! Sample rate conversion using rubato
//!
//! All audio entering the feature extractor must be at the model's training
//! rate, so every decode path funnels through here. Sinc interpolation keeps
//! the spectral content intact, which matters more than speed for clips of a
//! few seconds.

use rubato::{
    calculate_cutoff, Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::error::{DecodeOperation, Result, WildearError};

/// Inputs up to this many samples are resampled in a single pass.
const SINGLE_PASS_LIMIT: usize = 1 << 18;

/// Chunk size for the incremental path
const CHUNK_SIZE: usize = 4096;

/// Convert mono samples from one rate to another.
///
/// Returns the input unchanged when the rates already match.
pub fn to_rate(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>> {
    if from_sr == to_sr {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    if samples.len() <= SINGLE_PASS_LIMIT {
        resample_once(samples, from_sr, to_sr)
    } else {
        resample_chunked(samples, from_sr, to_sr)
    }
}

fn sinc_params(sinc_len: usize, window: WindowFunction) -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window,
    }
}

/// Whole-input resampling; the common case for clips of a few seconds.
fn resample_once(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>> {
    let params = sinc_params(256, WindowFunction::BlackmanHarris2);

    let mut resampler = SincFixedIn::<f32>::new(
        to_sr as f64 / from_sr as f64,
        2.0,
        params,
        samples.len(),
        1,
    )
    .map_err(|e| WildearError::decode(DecodeOperation::Resample, e.to_string()))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| WildearError::decode(DecodeOperation::Resample, e.to_string()))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Incremental resampling for long recordings, bounded memory per step.
fn resample_chunked(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>> {
    let params = sinc_params(128, WindowFunction::Blackman2);

    let mut resampler = SincFixedIn::<f32>::new(
        to_sr as f64 / from_sr as f64,
        1.1,
        params,
        CHUNK_SIZE,
        1,
    )
    .map_err(|e| WildearError::decode(DecodeOperation::Resample, e.to_string()))?;

    let ratio = to_sr as f64 / from_sr as f64;
    let mut out = Vec::with_capacity((samples.len() as f64 * ratio) as usize + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let input = vec![chunk.to_vec()];
        let output = resampler
            .process(&input, None)
            .map_err(|e| WildearError::decode(DecodeOperation::Resample, e.to_string()))?;
        if let Some(c) = output.into_iter().next() {
            out.extend(c);
        }
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let input = vec![tail.to_vec()];
        let output = resampler
            .process_partial(Some(&input), None)
            .map_err(|e| WildearError::decode(DecodeOperation::Resample, e.to_string()))?;
        if let Some(c) = output.into_iter().next() {
            out.extend(c);
        }
    }

    Ok(out)
}
