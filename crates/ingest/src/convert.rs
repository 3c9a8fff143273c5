//! NetCDF → grayscale PNG conversion.
//!
//! The CMI array is scaled with robust percentiles so a handful of hot
//! pixels can't wash out the image. When NetCDF support is unavailable a
//! fixed placeholder is produced instead and the frame is still catalogued.

use image::GrayImage;
use std::path::Path;

/// Side length of the placeholder image emitted without NetCDF support.
const PLACEHOLDER_SIZE: u32 = 100;
const PLACEHOLDER_FILL: u8 = 128;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("failed to encode png")]
    Encode(#[from] image::ImageError),
    #[cfg(feature = "netcdf")]
    #[error("failed to read netcdf payload")]
    NetCdf(#[from] netcdf::Error),
}

/// Robust (2nd, 98th) percentiles over non-NaN samples.
fn percentile_bounds(data: &[f32]) -> Option<(f32, f32)> {
    let mut valid: Vec<f32> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());

    let rank = |p: f64| -> f32 {
        let idx = (p * (valid.len() - 1) as f64).round() as usize;
        valid[idx.min(valid.len() - 1)]
    };
    let vmin = rank(0.02);
    let mut vmax = rank(0.98);
    if vmax <= vmin {
        vmax = vmin + 1.0;
    }
    Some((vmin, vmax))
}

/// Linearly map samples into `[0, 255]` with NaN → 0.
pub fn scale_to_gray(data: &[f32], width: u32, height: u32) -> GrayImage {
    debug_assert_eq!(data.len(), (width * height) as usize);

    let Some((vmin, vmax)) = percentile_bounds(data) else {
        return GrayImage::new(width, height);
    };
    let range = vmax - vmin;

    let pixels: Vec<u8> = data
        .iter()
        .map(|&v| {
            if v.is_nan() {
                0
            } else {
                (((v - vmin) / range) * 255.0).clamp(0.0, 255.0) as u8
            }
        })
        .collect();

    GrayImage::from_raw(width, height, pixels).expect("pixel buffer matches dimensions")
}

pub fn placeholder_image() -> GrayImage {
    GrayImage::from_pixel(
        PLACEHOLDER_SIZE,
        PLACEHOLDER_SIZE,
        image::Luma([PLACEHOLDER_FILL]),
    )
}

#[cfg(feature = "netcdf")]
fn read_cmi(nc_path: &Path) -> Result<(Vec<f32>, u32, u32), ConvertError> {
    let file = netcdf::open(nc_path)?;
    let var = file
        .variable("CMI")
        .ok_or_else(|| netcdf::Error::NotFound("CMI".to_string()))?;

    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let (height, width) = match dims.as_slice() {
        [h, w] => (*h, *w),
        other => {
            return Err(netcdf::Error::Str(format!(
                "CMI has unexpected shape {other:?}"
            ))
            .into())
        }
    };
    let data = var.get_values::<f32, _>(..)?;
    Ok((data, width as u32, height as u32))
}

/// Convert a downloaded NetCDF payload into an 8-bit grayscale PNG at
/// `png_path`. Returns the image dimensions.
pub fn netcdf_to_png(nc_path: &Path, png_path: &Path) -> Result<(u32, u32), ConvertError> {
    #[cfg(feature = "netcdf")]
    {
        match read_cmi(nc_path) {
            Ok((data, width, height)) => {
                let img = scale_to_gray(&data, width, height);
                img.save(png_path)?;
                return Ok((width, height));
            }
            Err(error) => {
                tracing::warn!(?nc_path, %error, "could not read CMI array, emitting placeholder");
            }
        }
    }
    #[cfg(not(feature = "netcdf"))]
    {
        let _ = nc_path;
        tracing::warn!("netcdf support not compiled in, emitting placeholder image");
    }

    let img = placeholder_image();
    img.save(png_path)?;
    Ok((PLACEHOLDER_SIZE, PLACEHOLDER_SIZE))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scaling_maps_extremes_to_full_range() {
        // 2%..98% percentile window over a linear ramp.
        let data: Vec<f32> = (0..100).map(|v| v as f32).collect();
        let img = scale_to_gray(&data, 10, 10);
        let pixels: Vec<u8> = img.into_raw();
        assert_eq!(pixels[0], 0);
        assert_eq!(pixels[99], 255);
        // Values below the 2nd percentile clamp to 0, above the 98th to 255.
        assert_eq!(pixels[1], 0);
        assert_eq!(pixels[98], 255);
    }

    #[test]
    fn nan_pixels_become_black() {
        let data = vec![f32::NAN, 1.0, 2.0, 3.0];
        let img = scale_to_gray(&data, 2, 2);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn all_nan_input_yields_black_image() {
        let data = vec![f32::NAN; 4];
        let img = scale_to_gray(&data, 2, 2);
        assert!(img.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn constant_input_does_not_divide_by_zero() {
        let data = vec![5.0f32; 9];
        let img = scale_to_gray(&data, 3, 3);
        // vmax is forced to vmin + 1, all pixels land at 0.
        assert!(img.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn placeholder_is_fixed_mid_gray() {
        let img = placeholder_image();
        assert_eq!(img.dimensions(), (100, 100));
        assert!(img.pixels().all(|p| p.0[0] == 128));
    }

    #[test]
    fn missing_netcdf_payload_falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let nc = dir.path().join("missing.nc");
        let png = dir.path().join("out.png");
        let (w, h) = netcdf_to_png(&nc, &png).unwrap();
        assert_eq!((w, h), (100, 100));
        assert!(png.exists());
    }
}
