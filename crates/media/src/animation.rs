//! Frame preparation for animations: crop, scale, preview downscale, loop
//! styles, and numbered frame output for the encoder.

use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Scale factors within this distance of 1.0 are treated as identity;
/// floating-point scale values are never compared with raw equality.
pub const SCALE_IDENTITY_TOLERANCE: f64 = 1e-9;

/// Width used for `preview` resolution output.
pub const PREVIEW_WIDTH: u32 = 960;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopStyle {
    Forward,
    PingPong,
    Hold,
}

impl std::str::FromStr for LoopStyle {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(LoopStyle::Forward),
            "pingpong" => Ok(LoopStyle::PingPong),
            "hold" => Ok(LoopStyle::Hold),
            other => Err(AnimationError::BadLoopStyle(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    #[error("no frames to render")]
    Empty,
    #[error("unknown loop style {0:?}")]
    BadLoopStyle(String),
    #[error("bad scale value {0:?}")]
    BadScale(String),
    #[error("image error")]
    Image(#[from] image::ImageError),
    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Parse a `"150%"`-style scale string into a factor.
pub fn parse_scale(scale: &str) -> Result<f64, AnimationError> {
    scale
        .strip_suffix('%')
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|p| *p > 0.0)
        .map(|p| p / 100.0)
        .ok_or_else(|| AnimationError::BadScale(scale.to_string()))
}

fn is_identity_scale(factor: f64) -> bool {
    (factor - 1.0).abs() < SCALE_IDENTITY_TOLERANCE
}

/// Expand source frame indices according to the loop style:
/// `forward` is the identity, `pingpong` appends the reversed interior, and
/// `hold` appends the last frame for two seconds of output (`fps × 2`).
pub fn expand_sequence(frame_count: usize, style: LoopStyle, fps: u32) -> Vec<usize> {
    let mut sequence: Vec<usize> = (0..frame_count).collect();
    match style {
        LoopStyle::Forward => {}
        LoopStyle::PingPong => {
            if frame_count > 2 {
                sequence.extend((1..frame_count - 1).rev());
            }
        }
        LoopStyle::Hold => {
            if let Some(&last) = sequence.last() {
                sequence.extend(std::iter::repeat(last).take((fps * 2) as usize));
            }
        }
    }
    sequence
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub crop: Option<CropRect>,
    pub scale: f64,
    pub preview: bool,
    pub loop_style: LoopStyle,
    pub fps: u32,
}

fn process_one(
    source: &Path,
    options: &RenderOptions,
) -> Result<DynamicImage, AnimationError> {
    let mut img = image::open(source)?;

    if let Some(crop) = options.crop {
        let (w, h) = (img.width(), img.height());
        if crop.x < w && crop.y < h {
            let cw = crop.width.min(w - crop.x);
            let ch = crop.height.min(h - crop.y);
            img = img.crop_imm(crop.x, crop.y, cw, ch);
        }
    }

    if !is_identity_scale(options.scale) {
        let new_w = ((img.width() as f64) * options.scale).round().max(1.0) as u32;
        let new_h = ((img.height() as f64) * options.scale).round().max(1.0) as u32;
        let filter = if options.scale < 1.0 {
            FilterType::Triangle
        } else {
            FilterType::CatmullRom
        };
        img = img.resize_exact(new_w, new_h, filter);
    }

    if options.preview && img.width() > PREVIEW_WIDTH {
        let ratio = PREVIEW_WIDTH as f64 / img.width() as f64;
        let new_h = ((img.height() as f64) * ratio).round().max(1.0) as u32;
        img = img.resize_exact(PREVIEW_WIDTH, new_h, FilterType::Triangle);
    }

    Ok(img)
}

/// Process a single still image: optional crop and scale, PNG output.
/// Used by the batch image-processing job.
pub fn process_still(
    source: &Path,
    dest: &Path,
    crop: Option<CropRect>,
    scale: f64,
) -> Result<(), AnimationError> {
    let options = RenderOptions {
        crop,
        scale,
        preview: false,
        loop_style: LoopStyle::Forward,
        fps: 1,
    };
    let img = process_one(source, &options)?;
    img.save(dest)?;
    Ok(())
}

#[derive(Debug)]
pub struct RenderedFrames {
    /// Number of files written into the working directory.
    pub output_count: usize,
    /// Number of distinct source frames that could be decoded.
    pub source_count: usize,
}

/// Process each readable source frame and write the expanded sequence as
/// `frame%06d.png` into `work_dir`. Unreadable sources are skipped with a
/// warning; an empty result is an error.
pub fn render_frames(
    sources: &[PathBuf],
    options: &RenderOptions,
    work_dir: &Path,
) -> Result<RenderedFrames, AnimationError> {
    std::fs::create_dir_all(work_dir)?;

    // Process each distinct source once, then lay the (possibly repeating)
    // sequence down as copies.
    let mut processed: Vec<PathBuf> = Vec::new();
    for (index, source) in sources.iter().enumerate() {
        match process_one(source, options) {
            Ok(img) => {
                let staged = work_dir.join(format!("staged{index:06}.png"));
                img.save(&staged)?;
                processed.push(staged);
            }
            Err(error) => {
                tracing::warn!(?source, %error, "skipping unreadable frame");
            }
        }
    }
    if processed.is_empty() {
        return Err(AnimationError::Empty);
    }

    let sequence = expand_sequence(processed.len(), options.loop_style, options.fps);
    for (output_index, &source_index) in sequence.iter().enumerate() {
        let dest = work_dir.join(format!("frame{output_index:06}.png"));
        std::fs::copy(&processed[source_index], &dest)?;
    }
    for staged in processed.iter() {
        let _ = std::fs::remove_file(staged);
    }

    Ok(RenderedFrames {
        output_count: sequence.len(),
        source_count: processed.len(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scale_parsing() {
        assert_eq!(parse_scale("100%").unwrap(), 1.0);
        assert_eq!(parse_scale("25%").unwrap(), 0.25);
        assert_eq!(parse_scale("150%").unwrap(), 1.5);
        assert!(parse_scale("fast").is_err());
        assert!(parse_scale("-10%").is_err());
    }

    #[test]
    fn near_one_scales_are_identity() {
        assert!(is_identity_scale(1.0 + 1e-10));
        assert!(is_identity_scale(1.0 - 1e-10));
        assert!(!is_identity_scale(0.999_999));
        assert!(!is_identity_scale(1.000_001));
    }

    #[test]
    fn forward_sequence_is_identity() {
        assert_eq!(expand_sequence(4, LoopStyle::Forward, 10), vec![0, 1, 2, 3]);
    }

    #[test]
    fn pingpong_appends_reversed_interior() {
        assert_eq!(
            expand_sequence(5, LoopStyle::PingPong, 10),
            vec![0, 1, 2, 3, 4, 3, 2, 1]
        );
        // Too short to have an interior.
        assert_eq!(expand_sequence(2, LoopStyle::PingPong, 10), vec![0, 1]);
        assert_eq!(expand_sequence(1, LoopStyle::PingPong, 10), vec![0]);
    }

    #[test]
    fn hold_appends_two_seconds_of_last_frame() {
        let seq = expand_sequence(3, LoopStyle::Hold, 10);
        assert_eq!(seq.len(), 3 + 20);
        assert!(seq[3..].iter().all(|&i| i == 2));
    }

    #[test]
    fn render_writes_numbered_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sources = Vec::new();
        for i in 0..3 {
            let path = dir.path().join(format!("src{i}.png"));
            image::GrayImage::from_pixel(64, 48, image::Luma([i as u8 * 40]))
                .save(&path)
                .unwrap();
            sources.push(path);
        }

        let work = dir.path().join("work");
        let rendered = render_frames(
            &sources,
            &RenderOptions {
                crop: None,
                scale: 0.5,
                preview: false,
                loop_style: LoopStyle::Forward,
                fps: 10,
            },
            &work,
        )
        .unwrap();

        assert_eq!(rendered.source_count, 3);
        assert_eq!(rendered.output_count, 3);
        for i in 0..3 {
            let frame = work.join(format!("frame{i:06}.png"));
            let (w, h) = image::image_dimensions(&frame).unwrap();
            assert_eq!((w, h), (32, 24));
        }
    }

    #[test]
    fn crop_is_clamped_to_image_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.png");
        image::GrayImage::from_pixel(100, 100, image::Luma([10]))
            .save(&path)
            .unwrap();

        let work = dir.path().join("work");
        render_frames(
            &[path],
            &RenderOptions {
                crop: Some(CropRect {
                    x: 50,
                    y: 50,
                    width: 500,
                    height: 500,
                }),
                scale: 1.0,
                preview: false,
                loop_style: LoopStyle::Forward,
                fps: 10,
            },
            &work,
        )
        .unwrap();

        let (w, h) = image::image_dimensions(work.join("frame000000.png")).unwrap();
        assert_eq!((w, h), (50, 50));
    }

    #[test]
    fn unreadable_sources_are_skipped_and_empty_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"junk").unwrap();

        let result = render_frames(
            &[bad],
            &RenderOptions {
                crop: None,
                scale: 1.0,
                preview: false,
                loop_style: LoopStyle::Forward,
                fps: 10,
            },
            &dir.path().join("work"),
        );
        assert!(matches!(result, Err(AnimationError::Empty)));
    }
}
