//! Storage for recipe images sent as base64 data URIs.

use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::ImageFormat;
use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const IMAGE_DIR: &str = "recipes/images";
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Parse `data:image/<type>;base64,<payload>`.
///
/// The stored extension comes from the decoded bytes, never from the
/// declared type, and anything that is not a supported image is rejected.
pub fn decode_data_uri(data: &str) -> AppResult<DecodedImage> {
    let rest = data
        .strip_prefix("data:image/")
        .ok_or_else(|| AppError::bad_request("image must be a base64 data URI"))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| AppError::bad_request("image must be a base64 data URI"))?;

    if !matches!(
        mime.to_ascii_lowercase().as_str(),
        "png" | "jpeg" | "jpg" | "gif" | "webp"
    ) {
        return Err(AppError::bad_request(format!(
            "unsupported image type '{mime}'"
        )));
    }

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| AppError::bad_request("image is not valid base64"))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("image is empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::bad_request("image is too large"));
    }

    let extension = match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::Gif) => "gif",
        Ok(ImageFormat::WebP) => "webp",
        _ => {
            return Err(AppError::bad_request(
                "image data is not a PNG, JPEG, GIF or WebP file",
            ));
        }
    };

    Ok(DecodedImage { extension, bytes })
}

/// Decode and write the image under `media_root`, returning the path relative to it.
pub async fn save_image(media_root: &str, data: &str) -> AppResult<String> {
    let image = decode_data_uri(data)?;
    let relative = format!("{IMAGE_DIR}/{}.{}", Uuid::new_v4(), image.extension);
    let dir = Path::new(media_root).join(IMAGE_DIR);

    fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("create media dir: {e}")))?;
    fs::write(Path::new(media_root).join(&relative), &image.bytes)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("write image: {e}")))?;

    tracing::debug!(path = %relative, size = image.bytes.len(), "stored recipe image");
    Ok(relative)
}

/// Best-effort removal; a missing file is not an error.
pub async fn remove_image(media_root: &str, relative: &str) {
    let path: PathBuf = Path::new(media_root).join(relative);
    if let Err(err) = fs::remove_file(&path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %path.display(), "failed to remove image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_data_uri(&format!("data:image/png;base64,{PIXEL}")).unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn rejects_plain_urls_and_bad_payloads() {
        assert!(decode_data_uri("https://example.com/cat.png").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
        assert!(decode_data_uri("data:image/tiff;base64,AAAA").is_err());
        assert!(decode_data_uri("data:image/png;base64,").is_err());
    }

    #[test]
    fn rejects_payloads_that_are_not_images() {
        // "<script>alert(1)</script>"
        let script = "data:image/png;base64,PHNjcmlwdD5hbGVydCgxKTwvc2NyaXB0Pg==";
        assert!(matches!(
            decode_data_uri(script),
            Err(AppError::BadRequest(ref m)) if m.contains("not a PNG")
        ));

        let text = format!("data:image/gif;base64,{}", BASE64.encode(b"GIF? no, plain text"));
        assert!(decode_data_uri(&text).is_err());
    }

    #[tokio::test]
    async fn saves_and_removes_image() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        let relative = save_image(root, &format!("data:image/jpeg;base64,{PIXEL}"))
            .await
            .unwrap();
        assert!(relative.starts_with("recipes/images/"));
        // declared as jpeg, but the bytes are a PNG
        assert!(relative.ends_with(".png"));
        assert!(dir.path().join(&relative).exists());

        remove_image(root, &relative).await;
        assert!(!dir.path().join(&relative).exists());
        // second removal is silent
        remove_image(root, &relative).await;
    }
}
