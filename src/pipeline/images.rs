// src/pipeline/images.rs

//! Image pipeline: WebP conversion plus re-encode optimization.
//!
//! The img task runs this module's two transforms as separate stages over
//! the same source set:
//!
//! - stage 1 ([`WebpConvert`]) writes a lossless `.webp` copy of every
//!   decodable raster,
//! - stage 2 ([`ImageOptimize`]) re-encodes the originals in place of a
//!   dedicated optimizer, copying non-raster files (svg, ico) through.
//!
//! The stages target the same output directory; distinct extensions keep
//! them from overwriting each other.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;

use crate::errors::{PipelineError, Result};
use crate::pipeline::{FileData, Transform};

/// JPEG re-encode quality for the optimization pass.
const JPEG_QUALITY: u8 = 80;

fn extension(input: &FileData) -> String {
    input
        .rel_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn is_raster(ext: &str) -> bool {
    matches!(ext, "png" | "jpg" | "jpeg" | "gif")
}

fn decode(input: &FileData) -> Result<DynamicImage> {
    image::load_from_memory(&input.contents)
        .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))
}

/// Stage 1: lossless WebP copies of decodable rasters.
pub struct WebpConvert;

impl Transform for WebpConvert {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        if !is_raster(&extension(input)) {
            // Non-raster files get no WebP sibling; stage 2 copies them.
            return Ok(Vec::new());
        }

        let img = decode(input)?;
        let rgba = img.to_rgba8();

        let mut buf = Vec::new();
        let encoder = WebPEncoder::new_lossless(Cursor::new(&mut buf));
        rgba.write_with_encoder(encoder)
            .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))?;

        Ok(vec![input.with_extension("webp", buf)])
    }
}

/// Stage 2: re-encode the original format; pass everything else through.
pub struct ImageOptimize;

impl Transform for ImageOptimize {
    fn name(&self) -> &'static str {
        "optimize"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let ext = extension(input);

        let optimized = match ext.as_str() {
            "png" => {
                let img = decode(input)?;
                let mut buf = Vec::new();
                img.to_rgba8()
                    .write_with_encoder(PngEncoder::new(Cursor::new(&mut buf)))
                    .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))?;
                buf
            }
            "jpg" | "jpeg" => {
                let img = decode(input)?;
                let mut buf = Vec::new();
                img.to_rgb8()
                    .write_with_encoder(JpegEncoder::new_with_quality(
                        Cursor::new(&mut buf),
                        JPEG_QUALITY,
                    ))
                    .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))?;
                buf
            }
            "gif" => {
                // Animated gif re-encoding loses frames; validate the header
                // and copy the original bytes.
                decode(input)?;
                input.contents.clone()
            }
            // svg, ico and friends are copied unchanged.
            _ => input.contents.clone(),
        };

        Ok(vec![FileData::new(input.rel_path.clone(), optimized)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A valid 2x2 red PNG produced via the `image` crate itself.
    fn red_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        img.write_with_encoder(PngEncoder::new(Cursor::new(&mut buf)))
            .unwrap();
        buf
    }

    #[test]
    fn raster_gets_a_webp_sibling() {
        let input = FileData::new("logo.png", red_png());
        let out = WebpConvert.apply(&input).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rel_path, std::path::PathBuf::from("logo.webp"));
        // RIFF....WEBP container magic.
        assert_eq!(&out[0].contents[..4], b"RIFF");
        assert_eq!(&out[0].contents[8..12], b"WEBP");
    }

    #[test]
    fn non_raster_is_skipped_by_webp_stage() {
        let input = FileData::new("icon.svg", b"<svg/>".to_vec());
        let out = WebpConvert.apply(&input).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn corrupt_raster_is_a_transform_error() {
        let input = FileData::new("broken.png", b"not a png".to_vec());
        assert!(matches!(
            WebpConvert.apply(&input),
            Err(PipelineError::Transform { .. })
        ));
        assert!(matches!(
            ImageOptimize.apply(&input),
            Err(PipelineError::Transform { .. })
        ));
    }

    #[test]
    fn optimize_keeps_the_original_name_and_format() {
        let input = FileData::new("logo.png", red_png());
        let out = ImageOptimize.apply(&input).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rel_path, std::path::PathBuf::from("logo.png"));
        assert_eq!(&out[0].contents[1..4], b"PNG");
    }

    #[test]
    fn optimize_copies_non_raster_files_through() {
        let input = FileData::new("icon.svg", b"<svg/>".to_vec());
        let out = ImageOptimize.apply(&input).unwrap();
        assert_eq!(out[0].contents, b"<svg/>");
    }
}
