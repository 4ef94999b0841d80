//! External ffmpeg transforms used by the mastering pipeline.
//!
//! Two fixed command lines: loudness normalization to the mastering target
//! (-14 LUFS integrated, -1.5 dB true peak, 11 LU range) and a time-bounded
//! MP3 preview render. Both run as child processes off the event loop.

use std::path::Path;
use std::process::Stdio;

use resona_core::jobs::truncate_error;

/// Target sample rate of the mastered output.
const MASTER_SAMPLE_RATE: &str = "44100";
/// Channel layout of the mastered output (stereo).
const MASTER_CHANNELS: &str = "2";
/// Preview clip length in seconds.
const PREVIEW_DURATION_SECS: u32 = 60;
/// Preview bitrate.
const PREVIEW_BITRATE: &str = "192k";

/// Error type for ffmpeg transform steps.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("{step} failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        step: &'static str,
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Argument list for the loudness-normalization transform.
///
/// Output is fixed-format WAV: 44.1 kHz stereo signed 16-bit PCM.
pub fn master_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-af".into(),
        "loudnorm=I=-14:TP=-1.5:LRA=11".into(),
        "-ar".into(),
        MASTER_SAMPLE_RATE.into(),
        "-ac".into(),
        MASTER_CHANNELS.into(),
        "-c:a".into(),
        "pcm_s16le".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Argument list for the preview-rendering transform.
///
/// Clips the first [`PREVIEW_DURATION_SECS`] seconds of the mastered file
/// to MP3 at a fixed bitrate.
pub fn preview_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-t".into(),
        PREVIEW_DURATION_SECS.to_string(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-vn".into(),
        "-c:a".into(),
        "libmp3lame".into(),
        "-b:a".into(),
        PREVIEW_BITRATE.into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Run `ffmpeg` with the given arguments, capturing stderr.
///
/// Failure stderr is truncated to the shared error bound before it travels
/// any further.
pub async fn run_ffmpeg(step: &'static str, args: &[String]) -> Result<(), TransformError> {
    let output = tokio::process::Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(TransformError::NotFound)?;

    if !output.status.success() {
        return Err(TransformError::ExecutionFailed {
            step,
            exit_code: output.status.code(),
            stderr: truncate_error(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn master_args_use_loudnorm_targets() {
        let args = master_args(&PathBuf::from("/tmp/in"), &PathBuf::from("/tmp/master.wav"));
        assert!(args.contains(&"loudnorm=I=-14:TP=-1.5:LRA=11".to_string()));
        assert!(args.contains(&"44100".to_string()));
        assert!(args.contains(&"pcm_s16le".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/master.wav");
    }

    #[test]
    fn master_args_overwrite_existing_output() {
        let args = master_args(&PathBuf::from("in"), &PathBuf::from("out"));
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn preview_args_bound_duration_before_input() {
        let args = preview_args(&PathBuf::from("/tmp/master.wav"), &PathBuf::from("/tmp/p.mp3"));
        let t = args.iter().position(|a| a == "-t").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(t < i, "-t must precede -i so the input read is bounded");
        assert_eq!(args[t + 1], "60");
        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"192k".to_string()));
    }

    #[tokio::test]
    async fn missing_input_reports_execution_failure() {
        // ffmpeg exits non-zero for a nonexistent input; skip when the
        // binary itself is unavailable.
        let args = master_args(
            &PathBuf::from("/nonexistent/input.wav"),
            &PathBuf::from("/tmp/resona-test-out.wav"),
        );
        match run_ffmpeg("mastering transform", &args).await {
            Err(TransformError::ExecutionFailed { step, stderr, .. }) => {
                assert_eq!(step, "mastering transform");
                assert!(stderr.len() <= resona_core::jobs::MAX_ERROR_LEN);
            }
            Err(TransformError::NotFound(_)) => {} // no ffmpeg on this host
            Ok(()) => panic!("expected failure for nonexistent input"),
        }
    }
}
