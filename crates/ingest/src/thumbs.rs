use std::path::{Path, PathBuf};

const THUMB_MAX: u32 = 256;

/// Generate a 256px JPEG thumbnail next to the thumbnails root. Returns None
/// (and logs) on any failure; thumbnails are never load-bearing.
pub fn generate_thumbnail(source: &Path, thumbnails_dir: &Path) -> Option<PathBuf> {
    let stem = source.file_stem()?.to_string_lossy();
    let thumb_path = thumbnails_dir.join(format!("thumb_{stem}.jpg"));

    let result = image::open(source).and_then(|img| {
        let thumb = img.thumbnail(THUMB_MAX, THUMB_MAX);
        thumb.to_rgb8().save(&thumb_path)?;
        Ok(())
    });

    match result {
        Ok(()) => Some(thumb_path),
        Err(error) => {
            tracing::warn!(?source, %error, "thumbnail generation failed");
            None
        }
    }
}

/// Width and height of an on-disk image, if readable.
pub fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    image::image_dimensions(path).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn thumbnail_shrinks_and_reports_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("frame.png");
        image::GrayImage::from_pixel(640, 480, image::Luma([90]))
            .save(&source)
            .unwrap();

        let thumb = generate_thumbnail(&source, dir.path()).unwrap();
        let (w, h) = image_dimensions(&thumb).unwrap();
        assert!(w <= 256 && h <= 256);
        assert_eq!(image_dimensions(&source), Some((640, 480)));
    }

    #[test]
    fn unreadable_source_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("not_an_image.png");
        std::fs::write(&source, b"junk").unwrap();
        assert!(generate_thumbnail(&source, dir.path()).is_none());
        assert!(image_dimensions(&source).is_none());
    }
}
