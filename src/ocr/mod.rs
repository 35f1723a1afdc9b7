use std::path::Path;

use image::{GenericImageView, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::adaptive_threshold;
use regex::Regex;
use tracing::warn;

use crate::config::Config;
use crate::errors::pipeline::PipelineError;

/// Loads an image, conditions it for OCR, and runs Tesseract, falling
/// back from the configured multi-language model to a single fallback
/// language if the combined model fails to load.
///
/// Grounded on the conditioning steps the original OCR worker applied
/// (grayscale, invert-if-dark, contrast, denoise, sharpen, adaptive
/// threshold) reimplemented with `image`/`imageproc` rather than OpenCV.
pub fn run_ocr(image_path: &Path, config: &Config) -> Result<String, PipelineError> {
    let conditioned = condition_image(image_path)?;

    let tmp = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .map_err(|e| PipelineError::Transient(e.to_string()))?;
    conditioned
        .save(tmp.path())
        .map_err(|e| PipelineError::Engine(format!("failed to write conditioned image: {e}")))?;

    let text = ocr_with_fallback(tmp.path(), &config.ocr_languages, &config.ocr_fallback_language)?;
    Ok(normalize_whitespace(&text))
}

fn condition_image(path: &Path) -> Result<GrayImage, PipelineError> {
    let img = image::open(path)
        .map_err(|e| PipelineError::BadInput(format!("unreadable image {}: {e}", path.display())))?;

    let mut gray = img.to_luma8();

    if mean_brightness(&gray) < 127.0 {
        invert_in_place(&mut gray);
    }

    let gray = approximate_clahe(&gray, 8);
    let gray = denoise(&gray);
    let gray = sharpen(&gray);
    let gray = adaptive_threshold(&gray, 17);

    Ok(gray)
}

fn mean_brightness(img: &GrayImage) -> f64 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let sum: u64 = img.pixels().map(|p| p.0[0] as u64).sum();
    sum as f64 / (w as f64 * h as f64)
}

fn invert_in_place(img: &mut GrayImage) {
    for pixel in img.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
}

/// Tile-local histogram equalization, approximating CLAHE: `imageproc`
/// has no direct CLAHE implementation, so brightness is equalized per
/// `tile_size`x`tile_size` block using that block's own histogram,
/// which captures the same "local contrast, not global" intent.
fn approximate_clahe(img: &GrayImage, tile_size: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out: GrayImage = ImageBuffer::new(w, h);

    for tile_y in (0..h).step_by(tile_size as usize) {
        for tile_x in (0..w).step_by(tile_size as usize) {
            let tw = tile_size.min(w - tile_x);
            let th = tile_size.min(h - tile_y);

            let mut hist = [0u32; 256];
            for y in tile_y..tile_y + th {
                for x in tile_x..tile_x + tw {
                    hist[img.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            let total = (tw * th) as f64;
            let mut cdf = [0f64; 256];
            let mut running = 0u32;
            for (i, count) in hist.iter().enumerate() {
                running += count;
                cdf[i] = running as f64 / total;
            }

            for y in tile_y..tile_y + th {
                for x in tile_x..tile_x + tw {
                    let v = img.get_pixel(x, y).0[0];
                    let equalized = (cdf[v as usize] * 255.0).round().clamp(0.0, 255.0) as u8;
                    out.put_pixel(x, y, Luma([equalized]));
                }
            }
        }
    }

    out
}

/// 3x3 median filter, approximating non-local-means denoising: a true
/// NLM implementation isn't available in `imageproc`, and a median
/// filter removes the same salt-and-pepper style OCR noise without the
/// quadratic patch-search cost.
fn denoise(img: &GrayImage) -> GrayImage {
    imageproc::filter::median_filter(img, 1, 1)
}

fn sharpen(img: &GrayImage) -> GrayImage {
    let kernel: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];
    imageproc::filter::filter3x3(img, &kernel)
}

fn ocr_with_fallback(path: &Path, languages: &str, fallback: &str) -> Result<String, PipelineError> {
    #[cfg(feature = "ocr")]
    {
        use tesseract::Tesseract;

        let path_str = path.to_str().ok_or_else(|| {
            PipelineError::Invariant("temp image path was not valid UTF-8".to_string())
        })?;

        let attempt = |lang: &str| -> Result<String, PipelineError> {
            let mut tess = Tesseract::new(None, Some(lang))
                .map_err(|e| PipelineError::Engine(format!("tesseract init failed for {lang}: {e}")))?;
            tess = tess
                .set_image(path_str)
                .map_err(|e| PipelineError::Engine(format!("tesseract set_image failed: {e}")))?;
            tess.get_text()
                .map_err(|e| PipelineError::Engine(format!("tesseract get_text failed: {e}")))
        };

        match attempt(languages) {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(languages, fallback, error = %e, "multi-language OCR failed, retrying with fallback language");
                attempt(fallback).map_err(|e| {
                    PipelineError::Engine(format!("fallback OCR with {fallback} also failed: {e}"))
                })
            }
        }
    }

    #[cfg(not(feature = "ocr"))]
    {
        let _ = (path, languages, fallback);
        Err(PipelineError::Engine(
            "OCR support was not compiled into this binary (missing `ocr` feature)".to_string(),
        ))
    }
}

fn normalize_whitespace(text: &str) -> String {
    static RE_CELL: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = RE_CELL.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    re.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_internal_whitespace() {
        assert_eq!(normalize_whitespace("  hello   world\n\tfoo "), "hello world foo");
    }

    #[test]
    fn mean_brightness_of_uniform_image() {
        let img: GrayImage = ImageBuffer::from_pixel(4, 4, Luma([200]));
        assert_eq!(mean_brightness(&img), 200.0);
    }

    #[test]
    fn invert_flips_uniform_image() {
        let mut img: GrayImage = ImageBuffer::from_pixel(2, 2, Luma([10]));
        invert_in_place(&mut img);
        assert_eq!(img.get_pixel(0, 0).0[0], 245);
    }
}
