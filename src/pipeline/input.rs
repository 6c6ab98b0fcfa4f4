//! Input resolution: turn user-supplied page references into [`PageImage`]s.
//!
//! A page can be given as a local image file, an `http(s)://` URL, or a
//! `data:image/...;base64,` URL (what a browser front-end hands over). The
//! MIME type is sniffed from magic bytes so a mislabelled file fails here
//! with a clear error rather than as an opaque 400 from the provider.

use crate::error::ExtractError;
use crate::tables::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check if the input string is a `data:` URL.
pub fn is_data_url(input: &str) -> bool {
    input.starts_with("data:")
}

/// Identify PNG, JPEG, GIF and WEBP by their magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// Wrap raw image bytes as the page at `index`.
pub fn image_from_bytes(index: usize, bytes: &[u8]) -> Result<PageImage, ExtractError> {
    let mime = sniff_mime(bytes).ok_or_else(|| ExtractError::UnsupportedImage {
        page: index + 1,
        magic: bytes.iter().take(4).copied().collect(),
    })?;
    let data = STANDARD.encode(bytes);
    debug!("Page {}: {} → {} bytes base64", index + 1, mime, data.len());
    Ok(PageImage::new(index, mime, data))
}

/// Parse a `data:<mime>;base64,<payload>` URL as the page at `index`.
///
/// The payload must be valid base64. A missing MIME type is sniffed from
/// the decoded bytes.
pub fn image_from_data_url(index: usize, url: &str) -> Result<PageImage, ExtractError> {
    let invalid = |detail: &str| ExtractError::InvalidImageData {
        page: index + 1,
        detail: detail.to_string(),
    };

    let rest = url.strip_prefix("data:").ok_or_else(|| invalid("not a data: URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("missing ',' separator"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("only base64 data URLs are supported"))?;

    let payload = payload.trim();
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| invalid(&format!("base64: {e}")))?;

    if mime.is_empty() {
        return image_from_bytes(index, &bytes);
    }
    if !mime.starts_with("image/") {
        return Err(invalid(&format!("'{mime}' is not an image type")));
    }
    Ok(PageImage::new(index, mime, payload))
}

/// Resolve one page reference (file path, URL or data URL).
pub async fn resolve_page_image(
    index: usize,
    input: &str,
    download_timeout_secs: u64,
) -> Result<PageImage, ExtractError> {
    if is_data_url(input) {
        image_from_data_url(index, input)
    } else if is_url(input) {
        let bytes = download_url(input, download_timeout_secs).await?;
        image_from_bytes(index, &bytes)
    } else {
        let path = PathBuf::from(input);
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractError::ImageNotFound { path: path.clone() },
            _ => ExtractError::Internal(format!("reading '{}': {e}", path.display())),
        })?;
        image_from_bytes(index, &bytes)
    }
}

/// Resolve page references in order; the n-th input becomes page index n.
pub async fn load_page_images<S: AsRef<str>>(
    inputs: &[S],
    download_timeout_secs: u64,
) -> Result<Vec<PageImage>, ExtractError> {
    let mut pages = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        pages.push(resolve_page_image(index, input.as_ref(), download_timeout_secs).await?);
    }
    info!("Loaded {} page images", pages.len());
    Ok(pages)
}

/// Download a page image.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ExtractError> {
    info!("Downloading page image from: {}", url);
    let failed = |reason: String| ExtractError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/p1.jpg"));
        assert!(is_url("http://example.com/p1.jpg"));
        assert!(!is_url("/tmp/p1.jpg"));
        assert!(!is_url("data:image/png;base64,AAAA"));
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_mime(&PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"%PDF-1.7"), None);
        assert_eq!(sniff_mime(&[]), None);
    }

    #[test]
    fn bytes_are_base64_encoded() {
        let img = image_from_bytes(0, &PNG_HEADER).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&img.data).unwrap(), PNG_HEADER);
    }

    #[test]
    fn non_image_bytes_are_rejected_with_page_number() {
        let err = image_from_bytes(2, b"%PDF-1.7").unwrap_err();
        match err {
            ExtractError::UnsupportedImage { page, magic } => {
                assert_eq!(page, 3);
                assert_eq!(magic, b"%PDF".to_vec());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn data_url_keeps_declared_mime() {
        let url = format!("data:image/jpeg;base64,{}", STANDARD.encode([0xFF, 0xD8, 0xFF]));
        let img = image_from_data_url(1, &url).unwrap();
        assert_eq!(img.index, 1);
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.to_data_url(), url);
    }

    #[test]
    fn data_url_without_mime_is_sniffed() {
        let url = format!("data:;base64,{}", STANDARD.encode(PNG_HEADER));
        assert_eq!(image_from_data_url(0, &url).unwrap().mime_type, "image/png");
    }

    #[test]
    fn bad_data_urls_are_rejected() {
        assert!(image_from_data_url(0, "data:image/png;base64,@@@").is_err());
        assert!(image_from_data_url(0, "data:image/png,plain").is_err());
        assert!(image_from_data_url(0, "data:text/plain;base64,QUJD").is_err());
    }

    #[test]
    fn missing_file_is_image_not_found() {
        let err = tokio_test::block_on(resolve_page_image(0, "/definitely/not/here.png", 5))
            .unwrap_err();
        assert!(matches!(err, ExtractError::ImageNotFound { .. }));
    }

    #[tokio::test]
    async fn files_load_in_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("b.png");
        let second = dir.path().join("a.jpg");
        std::fs::write(&first, PNG_HEADER).unwrap();
        std::fs::write(&second, [0xFF, 0xD8, 0xFF, 0xDB]).unwrap();

        let inputs = [
            first.to_string_lossy().to_string(),
            second.to_string_lossy().to_string(),
        ];
        let pages = load_page_images(&inputs, 5).await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!((pages[0].index, pages[0].mime_type.as_str()), (0, "image/png"));
        assert_eq!((pages[1].index, pages[1].mime_type.as_str()), (1, "image/jpeg"));
    }
}
