//! Audio file loading
//!
//! Supports multiple audio formats via symphonia:
//! - WAV (PCM, float)
//! - MP3
//! - FLAC
//! - OGG/Vorbis
//! - WebM (Vorbis tracks; Opus goes through the ffmpeg fallback)
//!
//! All paths produce a mono waveform at the caller's target sample rate.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::{resampler, transcode, Waveform};
use crate::error::{DecodeOperation, Result, WildearError};

/// Audio loader that supports various formats via symphonia
pub struct AudioLoader;

impl AudioLoader {
    /// Load audio from a file and return a mono waveform at `target_sr`.
    ///
    /// WAV files take a fast path through hound. Anything else (or a WAV
    /// whose contents turn out not to be WAV, which browsers produce when
    /// they record WebM under an `audio/wav` label) is probed by symphonia,
    /// and as a last resort rewritten to PCM WAV with ffmpeg and retried.
    pub fn load<P: AsRef<Path>>(path: P, target_sr: u32) -> Result<Waveform> {
        let path = path.as_ref();

        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        {
            match Self::load_wav(path, target_sr) {
                Ok(waveform) => return Ok(waveform),
                Err(e) => {
                    // Mislabeled container; fall through to content probing.
                    debug!(path = %path.display(), error = %e, "WAV fast path failed, probing content");
                }
            }
        }

        match Self::load_with_symphonia(path, target_sr) {
            Ok(waveform) => Ok(waveform),
            // Retry through ffmpeg only for undecodable content, not I/O failures.
            Err(e) if e.is_input_error() && transcode::ffmpeg_available() => {
                debug!(path = %path.display(), error = %e, "Direct decode failed, transcoding");
                match transcode::to_wav(path) {
                    Ok(wav_path) => {
                        let result = Self::load_wav(&wav_path, target_sr);
                        let _ = std::fs::remove_file(&wav_path);
                        result
                    }
                    // The original decode error surfaces; the failed rewrite
                    // only gets logged.
                    Err(transcode_err) => {
                        warn!(path = %path.display(), error = %transcode_err, "Transcode fallback failed");
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Decode audio from an in-memory buffer.
    ///
    /// `ext_hint` is the extension the bytes claim to be (without the dot),
    /// used only to steer the format probe. No ffmpeg fallback here; callers
    /// with a file on disk should use [`AudioLoader::load`] instead.
    pub fn load_bytes(data: &[u8], ext_hint: Option<&str>, target_sr: u32) -> Result<Waveform> {
        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = ext_hint {
            hint.with_extension(ext);
        }

        Self::decode_stream(mss, hint, target_sr)
    }

    /// Decode a file using symphonia's format probe.
    fn load_with_symphonia(path: &Path, target_sr: u32) -> Result<Waveform> {
        let src = File::open(path).map_err(|e| WildearError::Io {
            message: format!("failed to open audio file: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        let mss = MediaSourceStream::new(Box::new(src), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        Self::decode_stream(mss, hint, target_sr)
    }

    /// Shared decode loop for file and byte sources.
    fn decode_stream(mss: MediaSourceStream, hint: Hint, target_sr: u32) -> Result<Waveform> {
        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| {
                WildearError::decode(DecodeOperation::Probe, format!("unsupported format: {}", e))
            })?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                WildearError::decode(DecodeOperation::Codec, "no supported audio tracks")
            })?;

        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
            WildearError::decode(DecodeOperation::Codec, "unknown sample rate")
        })?;
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

        let dec_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &dec_opts)
            .map_err(|e| {
                WildearError::decode(DecodeOperation::Codec, format!("unsupported codec: {}", e))
            })?;

        let track_id = track.id;

        let mut all_samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break; // End of stream
                }
                Err(SymphoniaError::ResetRequired) => {
                    break;
                }
                Err(e) => {
                    return Err(WildearError::decode(
                        DecodeOperation::Packet,
                        format!("error reading packet: {}", e),
                    ));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    if sample_buf.is_none() {
                        let spec = *decoded.spec();
                        let duration = decoded.capacity() as u64;
                        sample_buf = Some(SampleBuffer::new(duration, spec));
                    }

                    if let Some(ref mut buf) = sample_buf {
                        buf.copy_interleaved_ref(decoded);
                        all_samples.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => {
                    // Skip corrupted packets
                    continue;
                }
                Err(e) => {
                    return Err(WildearError::decode(
                        DecodeOperation::Packet,
                        format!("decode failed: {}", e),
                    ));
                }
            }
        }

        if all_samples.is_empty() {
            return Err(WildearError::decode(
                DecodeOperation::Packet,
                "stream contained no decodable audio",
            ));
        }

        Self::finish(all_samples, channels, sample_rate, target_sr)
    }

    /// Load WAV files using hound (optimized for WAV)
    fn load_wav(path: &Path, target_sr: u32) -> Result<Waveform> {
        let reader = hound::WavReader::open(path).map_err(|e| {
            WildearError::decode(DecodeOperation::Probe, format!("not a WAV file: {}", e))
        })?;

        let spec = reader.spec();
        let sample_rate = spec.sample_rate;
        let channels = spec.channels as usize;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .filter_map(std::result::Result::ok)
                .collect(),
            hound::SampleFormat::Int => {
                let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .filter_map(std::result::Result::ok)
                    .map(|s| s as f32 / max_value)
                    .collect()
            }
        };

        if samples.is_empty() {
            return Err(WildearError::decode(
                DecodeOperation::Packet,
                "WAV file contains no samples",
            ));
        }

        Self::finish(samples, channels, sample_rate, target_sr)
    }

    /// Downmix interleaved samples to mono and resample to the target rate.
    fn finish(
        samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
        target_sr: u32,
    ) -> Result<Waveform> {
        let mono: Vec<f32> = if channels > 1 {
            samples
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        } else {
            samples
        };

        if sample_rate != target_sr {
            let resampled = resampler::to_rate(&mono, sample_rate, target_sr)?;
            Ok(Waveform::new(resampled, target_sr))
        } else {
            Ok(Waveform::new(mono, sample_rate))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_load_bytes_wav_mono() {
        let samples: Vec<i16> = (0..4410).map(|i| ((i % 100) * 300) as i16).collect();
        let bytes = wav_bytes(44100, 1, &samples);

        let waveform = AudioLoader::load_bytes(&bytes, Some("wav"), 44100).unwrap();
        assert_eq!(waveform.sample_rate, 44100);
        assert_eq!(waveform.samples.len(), 4410);
    }

    #[test]
    fn test_load_bytes_downmixes_stereo() {
        // Interleaved stereo: L=1000, R=-1000 averages to silence.
        let samples: Vec<i16> = (0..2000)
            .map(|i| if i % 2 == 0 { 1000 } else { -1000 })
            .collect();
        let bytes = wav_bytes(22050, 2, &samples);

        let waveform = AudioLoader::load_bytes(&bytes, Some("wav"), 22050).unwrap();
        assert_eq!(waveform.samples.len(), 1000);
        for &s in &waveform.samples {
            assert!(s.abs() < 1e-3);
        }
    }

    #[test]
    fn test_load_bytes_resamples() {
        let samples: Vec<i16> = vec![500; 44100];
        let bytes = wav_bytes(44100, 1, &samples);

        let waveform = AudioLoader::load_bytes(&bytes, Some("wav"), 22050).unwrap();
        assert_eq!(waveform.sample_rate, 22050);
        // One second of audio at the new rate, give or take filter edges.
        assert!((waveform.samples.len() as i64 - 22050).unsigned_abs() < 1024);
    }

    #[test]
    fn test_load_bytes_rejects_garbage() {
        let garbage = vec![0xDEu8, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03];
        let err = AudioLoader::load_bytes(&garbage, Some("webm"), 22050).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_load_rejects_missing_file() {
        let err = AudioLoader::load("/nonexistent/clip.mp3", 22050).unwrap_err();
        assert!(matches!(err, WildearError::Io { .. }));
    }

    #[test]
    fn test_garbage_file_surfaces_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.webm");
        std::fs::write(&path, [0xDEu8, 0xAD, 0xBE, 0xEF, 0x00, 0x01]).unwrap();

        // Whether or not an ffmpeg rewrite was attempted (and failed), the
        // decode error is what comes back.
        let err = AudioLoader::load(&path, 22050).unwrap_err();
        assert!(matches!(err, WildearError::Decode { .. }));
    }

    #[test]
    fn test_load_wav_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<i16> = (0..22050)
            .map(|i| (f32::sin(i as f32 * 0.05) * 8000.0) as i16)
            .collect();
        let mut file = File::create(&path).unwrap();
        file.write_all(&wav_bytes(22050, 1, &samples)).unwrap();

        let waveform = AudioLoader::load(&path, 22050).unwrap();
        assert_eq!(waveform.sample_rate, 22050);
        assert_eq!(waveform.samples.len(), 22050);
        assert!(waveform.samples.iter().any(|&s| s.abs() > 0.1));
    }
}
