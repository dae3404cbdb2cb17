//! Turns an uploaded leaf photo into the inline payload and chat preview.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::IMAGE_MIME_TYPE;
use crate::error::{AppError, AppResult};

/// Raw size cap. Base64 grows it by a third, which must stay under the
/// model's 20 MB inline request limit.
pub const MAX_IMAGE_BYTES: usize = 14 * 1024 * 1024;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Bare base64, sent to the model.
    pub base64: String,
    /// `data:` URI of the same bytes, shown in the chat.
    pub data_uri: String,
}

/// Reads one picked file from disk and encodes it.
pub async fn read_upload(path: &Path) -> AppResult<EncodedImage> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let size = tokio::fs::metadata(path).await?.len();
    if size > MAX_IMAGE_BYTES as u64 {
        return Err(too_large(&file_name, size));
    }

    let bytes = tokio::fs::read(path).await?;
    encode_upload(&file_name, &bytes)
}

/// Validates the bytes as a single JPEG still and base64-encodes them.
pub fn encode_upload(file_name: &str, bytes: &[u8]) -> AppResult<EncodedImage> {
    if bytes.is_empty() {
        return Err(AppError::Image(format!("{file_name} is empty")));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(too_large(file_name, bytes.len() as u64));
    }
    if !bytes.starts_with(&JPEG_MAGIC) {
        let declared = mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or("unknown type");
        return Err(AppError::Image(format!(
            "{file_name} ({declared}) is not a JPEG image"
        )));
    }

    let base64 = BASE64.encode(bytes);
    let data_uri = format!("data:{IMAGE_MIME_TYPE};base64,{base64}");
    log::debug!("Encoded {} ({} bytes -> {} chars)", file_name, bytes.len(), base64.len());
    Ok(EncodedImage { base64, data_uri })
}

fn too_large(file_name: &str, size: u64) -> AppError {
    AppError::Image(format!("{file_name} is {size} bytes, limit is {MAX_IMAGE_BYTES}"))
}
