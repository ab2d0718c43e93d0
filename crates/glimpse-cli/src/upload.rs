//! Image acquisition: turn a file on disk into a new story.
//!
//! The file must be an image. Images larger than the configured bounds are
//! downscaled to fit, keeping their aspect ratio, and re-encoded as JPEG;
//! anything already within bounds keeps its original bytes and type. The
//! result is embedded in the story as a `data:` URL.

use base64::Engine;
use glimpse_core::{ImageConfig, NewStory};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Why an upload was rejected. Displays as the message shown to the user.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select an image file")]
    NotAnImage,

    #[error("Error reading the file")]
    Read(#[source] io::Error),

    #[error("Error loading image")]
    Decode(#[source] image::ImageError),

    #[error("Error loading image")]
    Encode(#[source] image::ImageError),
}

/// Read `path` and build a story from it, stamped with `timestamp`.
pub fn story_from_file(
    path: &Path,
    config: &ImageConfig,
    timestamp: u64,
) -> Result<NewStory, UploadError> {
    let bytes = fs::read(path).map_err(UploadError::Read)?;
    let data_url = image_data_url(&bytes, config)?;
    Ok(NewStory::new(data_url, timestamp))
}

/// Encode image bytes as a `data:` URL that fits within `config`'s bounds.
pub fn image_data_url(bytes: &[u8], config: &ImageConfig) -> Result<String, UploadError> {
    let format = image::guess_format(bytes).map_err(|_| UploadError::NotAnImage)?;
    let mime = mime_type(format).ok_or(UploadError::NotAnImage)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(UploadError::Decode)?;

    let (width, height) = img.dimensions();
    if width <= config.max_width && height <= config.max_height {
        return Ok(data_url(mime, bytes));
    }

    // resize() fits within the box and keeps the aspect ratio
    let scaled = img.resize(config.max_width, config.max_height, FilterType::Triangle);
    log::debug!(
        "downscaled {}x{} to {}x{}",
        width,
        height,
        scaled.width(),
        scaled.height()
    );

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, config.jpeg_quality)
        .encode_image(&scaled.to_rgb8())
        .map_err(UploadError::Encode)?;
    Ok(data_url("image/jpeg", &jpeg))
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

fn mime_type(format: ImageFormat) -> Option<&'static str> {
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Avif => "image/avif",
        _ => return None,
    };
    Some(mime)
}
