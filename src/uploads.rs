//! Image upload handling: multipart reading, normalisation, storage.

use std::{collections::HashMap, io::Cursor, path::Path};

use axum::extract::Multipart;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
pub const MAX_WIDTH: u32 = 1000;
const JPEG_QUALITY: u8 = 85;
const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Text fields plus the first file field of a multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart, file_field: &str) -> AppResult<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Read error: {e}")))?
                    .to_vec();
                if !data.is_empty() && form.file.is_none() {
                    form.file = Some(UploadedFile { filename, data });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Read error: {e}")))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Decode, shrink to [`MAX_WIDTH`] and re-encode as JPEG.
pub fn normalize_image(file: &UploadedFile) -> AppResult<Vec<u8>> {
    if file.data.len() > MAX_FILE_SIZE {
        return Err(AppError::BadRequest(format!(
            "File too large: {} bytes (max {MAX_FILE_SIZE})",
            file.data.len()
        )));
    }

    let ext = Path::new(&file.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported format: {ext}. Supported: png, jpg, jpeg, webp"
        )));
    }

    let mut img = image::load_from_memory(&file.data)
        .map_err(|e| AppError::BadRequest(format!("Invalid image: {e}")))?;
    if img.width() > MAX_WIDTH {
        let height = (u64::from(img.height()) * u64::from(MAX_WIDTH) / u64::from(img.width()))
            .max(1) as u32;
        img = img.resize_exact(MAX_WIDTH, height, FilterType::Lanczos3);
    }

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), JPEG_QUALITY);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Image compression failed: {e}")))?;
    Ok(buffer)
}

/// Normalise and write the image under `upload_dir/<subdir>`, returning its public URL.
pub async fn store_image(upload_dir: &str, subdir: &str, file: &UploadedFile) -> AppResult<String> {
    let jpeg = normalize_image(file)?;
    let dir = Path::new(upload_dir).join(subdir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("create upload dir: {e}")))?;

    let filename = format!("{}.jpg", Uuid::new_v4());
    tokio::fs::write(dir.join(&filename), &jpeg)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("write upload: {e}")))?;

    tracing::info!(subdir, filename = %filename, bytes = jpeg.len(), "image stored");
    Ok(format!("{PUBLIC_PREFIX}/{subdir}/{filename}"))
}

/// Delete a file previously returned by [`store_image`]. Failures are logged,
/// not returned, since this only runs on error paths.
pub async fn remove_image(upload_dir: &str, public_url: &str) {
    let Some(relative) = public_url
        .strip_prefix(PUBLIC_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.split('/').any(|part| part == ".." || part.is_empty()))
    else {
        tracing::warn!(url = public_url, "not an upload url");
        return;
    };
    if let Err(err) = tokio::fs::remove_file(Path::new(upload_dir).join(relative)).await {
        tracing::warn!(url = public_url, error = %err, "failed to remove upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn wide_images_are_downscaled() {
        let file = UploadedFile {
            filename: "photo.PNG".into(),
            data: png(2000, 500),
        };
        let jpeg = normalize_image(&file).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), MAX_WIDTH);
        assert_eq!(decoded.height(), 250);
    }

    #[test]
    fn small_images_keep_their_size() {
        let file = UploadedFile {
            filename: "a.png".into(),
            data: png(40, 30),
        };
        let decoded = image::load_from_memory(&normalize_image(&file).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn rejects_unknown_extensions() {
        let file = UploadedFile {
            filename: "doc.pdf".into(),
            data: png(10, 10),
        };
        assert!(matches!(normalize_image(&file), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn stored_images_can_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let file = UploadedFile {
            filename: "a.png".into(),
            data: png(20, 20),
        };
        let url = store_image(&root, "reviews", &file).await.unwrap();
        let relative = url.strip_prefix("/uploads/").unwrap();
        assert!(dir.path().join(relative).exists());

        remove_image(&root, &url).await;
        assert!(!dir.path().join(relative).exists());

        // Paths outside the upload directory are ignored.
        remove_image(&root, "/uploads/../secret").await;
    }
}
