//! Multi-band composites: three grayscale band images blended into an RGB
//! PNG. Bands are resized in float space against the smallest available
//! shape so quantization happens exactly once.

use image::{imageops, GrayImage, ImageBuffer, Luma, RgbImage};
use models::Band;

#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    pub name: &'static str,
    pub display_name: &'static str,
    /// R, G, B channel bands.
    pub bands: [u8; 3],
}

/// Configured composite recipes. The channel order is R, G, B.
pub const RECIPES: &[Recipe] = &[
    Recipe {
        name: "true_color",
        display_name: "True Color",
        bands: [2, 3, 1],
    },
    Recipe {
        name: "natural_color",
        display_name: "Natural Color",
        bands: [5, 3, 2],
    },
    Recipe {
        name: "fire_detection",
        display_name: "Fire Detection",
        bands: [7, 6, 5],
    },
    Recipe {
        name: "dust_ash",
        display_name: "Dust & Ash",
        bands: [15, 14, 11],
    },
    Recipe {
        name: "day_cloud_phase",
        display_name: "Day Cloud Phase",
        bands: [13, 2, 5],
    },
    Recipe {
        name: "airmass",
        display_name: "Airmass",
        bands: [8, 10, 12],
    },
];

pub fn recipe(name: &str) -> Option<&'static Recipe> {
    RECIPES.iter().find(|r| r.name == name)
}

impl Recipe {
    pub fn band_list(&self) -> Vec<Band> {
        self.bands
            .iter()
            .map(|&c| Band::new(c).expect("recipe bands are valid channels"))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("no band images available for composite")]
    NoBands,
    #[error("image error")]
    Image(#[from] image::ImageError),
}

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

fn to_f32(img: &GrayImage) -> GrayF32 {
    let (w, h) = img.dimensions();
    let data: Vec<f32> = img.as_raw().iter().map(|&v| v as f32).collect();
    GrayF32::from_raw(w, h, data).expect("raw buffer matches dimensions")
}

/// Min/max normalize a float channel into u8; a flat channel becomes black.
fn normalize_to_u8(buf: &GrayF32) -> Vec<u8> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in buf.as_raw() {
        min = min.min(v);
        max = max.max(v);
    }
    if max <= min {
        return vec![0; buf.as_raw().len()];
    }
    let range = max - min;
    buf.as_raw()
        .iter()
        .map(|&v| (((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8)
        .collect()
}

/// Blend up to three band images into an RGB image. The smallest available
/// shape is the reference; other bands are bilinear-resized in float space;
/// missing bands become zero channels.
pub fn compose_rgb(bands: [Option<GrayImage>; 3]) -> Result<RgbImage, CompositeError> {
    let reference = bands
        .iter()
        .flatten()
        .map(GrayImage::dimensions)
        .min_by_key(|&(w, h)| (w as u64) * (h as u64))
        .ok_or(CompositeError::NoBands)?;
    let (ref_w, ref_h) = reference;

    let mut channels: Vec<Vec<u8>> = Vec::with_capacity(3);
    for band in &bands {
        match band {
            None => channels.push(vec![0; (ref_w * ref_h) as usize]),
            Some(img) => {
                let mut buf = to_f32(img);
                if img.dimensions() != reference {
                    buf = imageops::resize(&buf, ref_w, ref_h, imageops::FilterType::Triangle);
                }
                channels.push(normalize_to_u8(&buf));
            }
        }
    }

    let mut rgb = RgbImage::new(ref_w, ref_h);
    for (i, pixel) in rgb.pixels_mut().enumerate() {
        pixel.0 = [channels[0][i], channels[1][i], channels[2][i]];
    }
    Ok(rgb)
}

#[cfg(test)]
mod test {
    use super::*;

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| image::Luma([(x % 256) as u8]))
    }

    #[test]
    fn recipes_cover_the_configured_set() {
        for name in [
            "true_color",
            "natural_color",
            "fire_detection",
            "dust_ash",
            "day_cloud_phase",
            "airmass",
        ] {
            let recipe = recipe(name).unwrap();
            assert_eq!(recipe.band_list().len(), 3);
        }
        assert!(recipe("sharpened_veggie").is_none());
    }

    #[test]
    fn smallest_shape_is_the_reference() {
        let rgb = compose_rgb([
            Some(gradient(100, 100)),
            Some(gradient(50, 50)),
            Some(gradient(200, 200)),
        ])
        .unwrap();
        assert_eq!(rgb.dimensions(), (50, 50));
    }

    #[test]
    fn missing_bands_become_zero_channels() {
        let rgb = compose_rgb([Some(gradient(10, 10)), None, None]).unwrap();
        assert!(rgb.pixels().all(|p| p.0[1] == 0 && p.0[2] == 0));
        // The present channel still carries signal.
        assert!(rgb.pixels().any(|p| p.0[0] > 0));
    }

    #[test]
    fn all_missing_is_an_error() {
        assert!(matches!(
            compose_rgb([None, None, None]),
            Err(CompositeError::NoBands)
        ));
    }

    #[test]
    fn flat_band_normalizes_to_black_without_panicking() {
        let flat = GrayImage::from_pixel(8, 8, image::Luma([77]));
        let rgb = compose_rgb([Some(flat), None, None]).unwrap();
        assert!(rgb.pixels().all(|p| p.0 == [0, 0, 0]));
    }
}
