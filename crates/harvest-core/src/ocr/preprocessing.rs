//! Image variants fed to the recognizer.
//!
//! Different scans respond to different cleanup, so a page is recognized
//! under several variants and the longest text wins.

use image::{DynamicImage, GrayImage, Luma};
use tracing::trace;

/// One preprocessing variant applied before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrVariant {
    /// The rendered page as-is.
    Original,
    /// Grayscale with the histogram stretched to the full range.
    Contrast,
    /// Black/white at the mean intensity.
    Binarized,
    /// Enlarged by half, for small print.
    Upscaled,
}

impl OcrVariant {
    /// Variants in the order they are tried.
    pub const ALL: [OcrVariant; 4] = [
        OcrVariant::Original,
        OcrVariant::Contrast,
        OcrVariant::Binarized,
        OcrVariant::Upscaled,
    ];

    /// Produce the variant image.
    pub fn apply(self, image: &DynamicImage) -> DynamicImage {
        trace!("Preparing OCR variant {:?}", self);
        match self {
            OcrVariant::Original => image.clone(),
            OcrVariant::Contrast => DynamicImage::ImageLuma8(stretch_contrast(&image.to_luma8())),
            OcrVariant::Binarized => DynamicImage::ImageLuma8(binarize(&image.to_luma8())),
            OcrVariant::Upscaled => {
                let width = image.width() + image.width() / 2;
                let height = image.height() + image.height() / 2;
                image.resize_exact(width, height, image::imageops::FilterType::CatmullRom)
            }
        }
    }
}

fn stretch_contrast(gray: &GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return gray.clone();
    }
    let range = f32::from(max - min);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = f32::from(gray.get_pixel(x, y)[0] - min) / range * 255.0;
        Luma([value.round() as u8])
    })
}

fn binarize(gray: &GrayImage) -> GrayImage {
    let count = u64::from(gray.width()) * u64::from(gray.height());
    if count == 0 {
        return gray.clone();
    }
    let sum: u64 = gray.pixels().map(|p| u64::from(p[0])).sum();
    let threshold = (sum / count) as u8;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
