//! Transcoder (spec §4.G): external codec invocation to normalize inbound
//! audio to mono/16kHz/≤32kb/s before it reaches SpeechClient.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use voicecap_core::error::{CoreError, ErrorCategory};

const CONVERSION_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_MIN_SECS: f64 = 5.0;
const FALLBACK_MAX_SECS: f64 = 30.0;

#[derive(Debug, thiserror::Error)]
pub enum TranscoderError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),
    #[error("transcoder process failed: {0}")]
    ProcessFailed(#[from] std::io::Error),
}

impl From<TranscoderError> for CoreError {
    fn from(err: TranscoderError) -> Self {
        let category = match &err {
            TranscoderError::UnsupportedFormat(_) => ErrorCategory::UnsupportedFormat,
            TranscoderError::Timeout(_) => ErrorCategory::Timeout,
            TranscoderError::ProcessFailed(_) => ErrorCategory::Unavailable,
        };
        CoreError::new(category, err.to_string())
    }
}

#[derive(Clone, Default)]
pub struct Transcoder;

impl Transcoder {
    pub fn new() -> Self {
        Self
    }

    /// Normalize `in_bytes` to the canonical codec via an external `ffmpeg`
    /// subprocess, piping bytes on stdin/stdout rather than touching disk.
    pub async fn normalize(
        &self,
        in_bytes: &[u8],
        source_hint: &str,
    ) -> Result<Vec<u8>, TranscoderError> {
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                source_hint,
                "-i",
                "pipe:0",
                "-ac",
                "1",
                "-ar",
                "16000",
                "-b:a",
                "32k",
                "-f",
                "opus",
                "pipe:1",
            ])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()?;

        let mut stdin = child.stdin.take().expect("stdin piped");
        let in_bytes = in_bytes.to_vec();
        let write_task = tokio::spawn(async move {
            let _ = stdin.write_all(&in_bytes).await;
        });

        let wait = async {
            let output = child.wait_with_output().await?;
            let _ = write_task.await;
            Ok::<_, std::io::Error>(output)
        };

        let output = match timeout(CONVERSION_TIMEOUT, wait).await {
            Ok(result) => result?,
            Err(_) => return Err(TranscoderError::Timeout(CONVERSION_TIMEOUT)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(TranscoderError::UnsupportedFormat(stderr));
        }

        Ok(output.stdout)
    }

    /// Duration in seconds via `ffprobe`. For the canonical codec this must
    /// succeed; callers pass `canonical = true` in that case. For
    /// non-canonical bytes a size-based estimate clamped to [5, 30]s is an
    /// acceptable fallback (spec §4.G).
    pub async fn duration_seconds(
        &self,
        bytes: &[u8],
        canonical: bool,
    ) -> Result<f64, TranscoderError> {
        match self.probe_duration(bytes).await {
            Ok(secs) => Ok(secs),
            Err(e) if canonical => Err(e),
            Err(_) => Ok(estimate_duration_from_size(bytes.len())),
        }
    }

    async fn probe_duration(&self, bytes: &[u8]) -> Result<f64, TranscoderError> {
        let mut child = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                "pipe:0",
            ])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()?;

        let mut stdin = child.stdin.take().expect("stdin piped");
        let bytes = bytes.to_vec();
        let write_task = tokio::spawn(async move {
            let _ = stdin.write_all(&bytes).await;
        });

        let output = timeout(CONVERSION_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| TranscoderError::Timeout(CONVERSION_TIMEOUT))??;
        let _ = write_task.await;

        if !output.status.success() {
            return Err(TranscoderError::UnsupportedFormat(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .map_err(|_| TranscoderError::UnsupportedFormat("ffprobe returned no duration".to_string()))
    }
}

fn estimate_duration_from_size(size_bytes: usize) -> f64 {
    // Rough inverse of the canonical 32kb/s bitrate, clamped to the
    // fallback range spec §4.G allows for non-canonical input.
    let estimated = (size_bytes as f64 * 8.0) / 32_000.0;
    estimated.clamp(FALLBACK_MIN_SECS, FALLBACK_MAX_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_estimate_is_clamped_to_fallback_range() {
        assert_eq!(estimate_duration_from_size(0), FALLBACK_MIN_SECS);
        assert_eq!(estimate_duration_from_size(10_000_000), FALLBACK_MAX_SECS);
    }
}
