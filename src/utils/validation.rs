//! Image payload integrity checks
//!
//! A 200 OK response is not proof of a usable image: providers serve HTML
//! error pages and truncated files with a success status. Every downloaded
//! payload passes through here before it is cached or stored.

use image::ImageFormat;

/// Minimum plausible size for a real unit asset. Anything smaller is a
/// stub or an error page.
pub const DEFAULT_MIN_ASSET_BYTES: usize = 1024;

/// Validate payload bytes: minimum size AND a recognized image signature.
/// Returns the detected format, or a human-readable rejection reason.
pub fn validate_image_bytes(data: &[u8], min_bytes: usize) -> Result<ImageFormat, String> {
    if data.len() < min_bytes {
        return Err(format!(
            "payload too small: {} bytes (minimum {})",
            data.len(),
            min_bytes
        ));
    }

    detect_image_format(data).ok_or_else(|| {
        if looks_like_html(data) {
            "payload is an HTML document, not an image".to_string()
        } else {
            "unrecognized image signature".to_string()
        }
    })
}

/// Detect image format from magic bytes.
pub fn detect_image_format(data: &[u8]) -> Option<ImageFormat> {
    if data.len() < 12 {
        return None;
    }

    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageFormat::Png)
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some(ImageFormat::WebP)
    } else {
        // Last resort: let the image crate try
        image::guess_format(data).ok()
    }
}

pub fn format_to_mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        _ => "application/octet-stream",
    }
}

fn looks_like_html(data: &[u8]) -> bool {
    let head = &data[..data.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start().to_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html") || head.starts_with("<?xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_payload(len: usize) -> Vec<u8> {
        let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        data.resize(len, 0xAB);
        data
    }

    #[test]
    fn small_payload_rejected_regardless_of_signature() {
        let data = png_payload(500);
        let err = validate_image_bytes(&data, DEFAULT_MIN_ASSET_BYTES).unwrap_err();
        assert!(err.contains("too small"));
    }

    #[test]
    fn sufficient_size_but_wrong_magic_rejected() {
        let data = vec![0x00; 50_000];
        let err = validate_image_bytes(&data, DEFAULT_MIN_ASSET_BYTES).unwrap_err();
        assert!(err.contains("unrecognized"));
    }

    #[test]
    fn html_error_page_rejected_with_reason() {
        let mut data = b"<!DOCTYPE html><html><body>404</body></html>".to_vec();
        data.resize(4096, b' ');
        let err = validate_image_bytes(&data, DEFAULT_MIN_ASSET_BYTES).unwrap_err();
        assert!(err.contains("HTML"));
    }

    #[test]
    fn valid_png_accepted() {
        let data = png_payload(45 * 1024);
        assert_eq!(
            validate_image_bytes(&data, DEFAULT_MIN_ASSET_BYTES).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn webp_signature_detected() {
        let mut data = b"RIFF\x00\x00\x00\x00WEBP".to_vec();
        data.resize(2048, 0);
        assert_eq!(detect_image_format(&data), Some(ImageFormat::WebP));
    }
}
