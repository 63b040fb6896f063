//! Container transcode fallback via ffmpeg
//!
//! Browser recordings usually arrive as WebM/Opus, which the direct decode
//! path cannot open. When that happens the loader rewrites the container to
//! plain PCM WAV with ffmpeg and retries. ffmpeg is probed once per process;
//! without it the fallback is skipped and the original decode error stands.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::{Result, WildearError};

static FFMPEG_AVAILABLE: Lazy<bool> = Lazy::new(|| {
    match Command::new("ffmpeg").arg("-version").output() {
        Ok(out) if out.status.success() => true,
        _ => {
            warn!("ffmpeg not found on PATH; container transcode fallback disabled");
            false
        }
    }
});

/// Whether the transcode fallback can run at all.
pub fn ffmpeg_available() -> bool {
    *FFMPEG_AVAILABLE
}

/// Transcode an audio container to a 16-bit PCM WAV next to the input.
///
/// Returns the path of the produced WAV. The input file is left in place;
/// the caller owns cleanup of both.
pub fn to_wav(input: &Path) -> Result<PathBuf> {
    if !ffmpeg_available() {
        return Err(WildearError::Transcode {
            message: "ffmpeg not available".to_string(),
        });
    }

    let output = wav_sibling(input);

    debug!(input = %input.display(), output = %output.display(), "Transcoding to WAV");

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(input)
        .arg("-ac")
        .arg("1")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg(&output)
        .output()
        .map_err(|e| WildearError::Transcode {
            message: format!("failed to launch ffmpeg: {}", e),
        })?;

    if !status.status.success() {
        return Err(WildearError::Transcode {
            message: format!(
                "ffmpeg exited with {}: {}",
                status.status,
                String::from_utf8_lossy(&status.stderr).trim()
            ),
        });
    }

    Ok(output)
}

/// Output path for the transcoded WAV: same stem, `.wav` extension, with a
/// `.pcm.wav` suffix when the input already ends in `.wav`.
fn wav_sibling(input: &Path) -> PathBuf {
    let already_wav = input
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if already_wav {
        input.with_extension("pcm.wav")
    } else {
        input.with_extension("wav")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_sibling_extension() {
        assert_eq!(
            wav_sibling(Path::new("uploads/clip.webm")),
            PathBuf::from("uploads/clip.wav")
        );
        assert_eq!(
            wav_sibling(Path::new("uploads/clip.m4a")),
            PathBuf::from("uploads/clip.wav")
        );
    }

    #[test]
    fn test_wav_sibling_avoids_self_overwrite() {
        assert_eq!(
            wav_sibling(Path::new("uploads/clip.wav")),
            PathBuf::from("uploads/clip.pcm.wav")
        );
    }
}
