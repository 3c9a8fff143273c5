//! Video encoding via the external `ffmpeg` binary.

use std::path::Path;
use tokio::process::Command;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    Mp4,
    Gif,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Mp4 => "mp4",
            Format::Gif => "gif",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(Format::Mp4),
            "gif" => Ok(Format::Gif),
            other => Err(EncodeError::BadFormat(other.to_string())),
        }
    }
}

/// H.264 CRF per quality tier.
pub fn crf_for_quality(quality: &str) -> &'static str {
    match quality {
        "low" => "28",
        "high" => "18",
        _ => "23",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("unknown output format {0:?}")]
    BadFormat(String),
    #[error("could not launch ffmpeg (is it installed?)")]
    Spawn(#[source] std::io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

async fn run_ffmpeg(args: &[&str]) -> Result<(), EncodeError> {
    tracing::debug!(?args, "invoking ffmpeg");
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(EncodeError::Spawn)?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Keep the tail; ffmpeg front-loads banner noise.
        let tail: String = stderr
            .lines()
            .rev()
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        Err(EncodeError::Failed {
            status: output.status,
            stderr: tail,
        })
    }
}

/// Encode `frame%06d.png` under `work_dir` into `output`.
///
/// mp4 is H.264 with a quality-tier CRF, `yuv420p`, and `+faststart`; gif is
/// two-pass through a generated palette.
pub async fn encode(
    work_dir: &Path,
    output: &Path,
    format: Format,
    fps: u32,
    quality: &str,
) -> Result<(), EncodeError> {
    let pattern = work_dir.join("frame%06d.png");
    let pattern = pattern.to_string_lossy();
    let fps = fps.to_string();
    let out = output.to_string_lossy();

    match format {
        Format::Mp4 => {
            run_ffmpeg(&[
                "-y",
                "-framerate",
                &fps,
                "-i",
                &pattern,
                "-c:v",
                "libx264",
                "-crf",
                crf_for_quality(quality),
                "-preset",
                "medium",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
                &out,
            ])
            .await
        }
        Format::Gif => {
            let palette = work_dir.join("palette.png");
            let palette = palette.to_string_lossy();
            run_ffmpeg(&[
                "-y",
                "-framerate",
                &fps,
                "-i",
                &pattern,
                "-vf",
                "palettegen",
                &palette,
            ])
            .await?;
            run_ffmpeg(&[
                "-y",
                "-framerate",
                &fps,
                "-i",
                &pattern,
                "-i",
                &palette,
                "-lavfi",
                "paletteuse",
                &out,
            ])
            .await
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quality_maps_to_crf() {
        assert_eq!(crf_for_quality("low"), "28");
        assert_eq!(crf_for_quality("medium"), "23");
        assert_eq!(crf_for_quality("high"), "18");
        // Unknown tiers fall back to medium.
        assert_eq!(crf_for_quality("ultra"), "23");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("mp4".parse::<Format>().unwrap(), Format::Mp4);
        assert_eq!("gif".parse::<Format>().unwrap(), Format::Gif);
        assert!("webm".parse::<Format>().is_err());
        assert_eq!(Format::Gif.extension(), "gif");
    }
}
