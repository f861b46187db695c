//! In-process derivation with the `image` crate. No external tools.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` |
//! | Rotation correction | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Big (fit, never upscaled) | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Small (square crop) | `DynamicImage::resize_to_fill` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::calculations::fit_within;
use super::deriver::{DeriveError, DeriveParams, Deriver};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDeriver;

impl BuiltinDeriver {
    pub fn new() -> Self {
        Self
    }
}

fn processing(path: &Path, what: &str, e: image::ImageError) -> DeriveError {
    DeriveError::ProcessingFailed(format!("Failed to {what} {}: {e}", path.display()))
}

/// Load and decode an image, optionally applying its orientation tag.
fn load_image(path: &Path, rotate: bool) -> Result<DynamicImage, DeriveError> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| processing(path, "decode", e))?;
    let orientation = if rotate {
        decoder.orientation().ok()
    } else {
        None
    };
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| processing(path, "decode", e))?;
    if let Some(orientation) = orientation {
        img.apply_orientation(orientation);
    }
    Ok(img)
}

fn save_jpeg(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), DeriveError> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100) as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| processing(path, "encode", e))
}

impl Deriver for BuiltinDeriver {
    fn derive(&self, params: &DeriveParams) -> Result<(), DeriveError> {
        let img = load_image(&params.source, params.rotate)?;
        let out = if params.crop {
            img.resize_to_fill(params.size, params.size, FilterType::Lanczos3)
        } else {
            let (w, h) = fit_within((img.width(), img.height()), params.size);
            if (w, h) == (img.width(), img.height()) {
                img
            } else {
                img.resize_exact(w, h, FilterType::Lanczos3)
            }
        };
        save_jpeg(&out, &params.output, params.quality.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_jpeg;
    use crate::thumbs::deriver::Quality;
    use tempfile::TempDir;

    fn derive(source: &Path, output: &Path, size: u32, crop: bool) -> Result<(), DeriveError> {
        BuiltinDeriver::new().derive(&DeriveParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            size,
            crop,
            rotate: true,
            quality: Quality::new(90),
        })
    }

    #[test]
    fn big_fits_within_size() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);
        let output = tmp.path().join("big.jpg");

        derive(&source, &output, 100, false).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (100, 75));
    }

    #[test]
    fn big_does_not_upscale() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 60, 80);
        let output = tmp.path().join("big.jpg");

        derive(&source, &output, 100, false).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (60, 80));
    }

    #[test]
    fn small_is_square_crop() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);
        let output = tmp.path().join("small.jpg");

        derive(&source, &output, 50, true).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (50, 50));
    }

    #[test]
    fn output_is_jpeg_even_without_extension() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 40, 40);
        let output = tmp.path().join(".tmp-artifact");

        derive(&source, &output, 20, true).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn corrupt_source_errors() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not a jpeg").unwrap();
        let output = tmp.path().join("out.jpg");

        assert!(derive(&source, &output, 100, false).is_err());
    }

    #[test]
    fn missing_source_errors() {
        let tmp = TempDir::new().unwrap();
        let result = derive(
            Path::new("/nonexistent/a.jpg"),
            &tmp.path().join("out.jpg"),
            100,
            false,
        );
        assert!(matches!(result, Err(DeriveError::Io(_))));
    }
}
