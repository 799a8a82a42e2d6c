use base64::Engine;
use bytes::Bytes;
use image::ImageFormat;
use thiserror::Error;
use tracing::debug;

use crate::models::EncodedImagePart;

const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/heic",
    "image/heif",
];

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("upload {0:?} is empty")]
    Empty(String),
    #[error("upload {name:?} has unsupported type {mime}")]
    Unsupported { name: String, mime: String },
    #[error("failed to read upload: {0}")]
    Read(String),
}

/// A raw file as received from a client, before encoding.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub declared_mime: Option<String>,
    pub bytes: Bytes,
}

/// Encodes one file into its transport form. The MIME type comes from the
/// declared type; generic or missing declarations fall back to sniffing.
pub fn encode_bytes(upload: &Upload) -> Result<EncodedImagePart, EncodeError> {
    if upload.bytes.is_empty() {
        return Err(EncodeError::Empty(upload.name.clone()));
    }
    let mime_type = resolve_mime(upload.declared_mime.as_deref(), &upload.bytes);
    if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(EncodeError::Unsupported { name: upload.name.clone(), mime: mime_type });
    }
    let data = base64::engine::general_purpose::STANDARD.encode(&upload.bytes);
    debug!(name = %upload.name, %mime_type, bytes = upload.bytes.len(), "encoded upload");
    Ok(EncodedImagePart { mime_type, data })
}

/// Encodes a batch concurrently. The output keeps the input order since
/// backend requests are positional.
pub async fn encode_all(uploads: Vec<Upload>) -> Result<Vec<EncodedImagePart>, EncodeError> {
    futures::future::try_join_all(uploads.into_iter().map(encode_one)).await
}

/// Encodes a single upload off the async workers.
pub async fn encode_one(upload: Upload) -> Result<EncodedImagePart, EncodeError> {
    tokio::task::spawn_blocking(move || encode_bytes(&upload))
        .await
        .map_err(|e| EncodeError::Read(e.to_string()))?
}

fn resolve_mime(declared: Option<&str>, bytes: &[u8]) -> String {
    let declared = declared
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty() && m != "application/octet-stream");
    match declared {
        Some(mime) if mime == "image/jpg" => "image/jpeg".to_string(),
        Some(mime) => mime,
        None => image::guess_format(bytes)
            .map(|format| match format {
                ImageFormat::Png => "image/png",
                ImageFormat::Jpeg => "image/jpeg",
                ImageFormat::WebP => "image/webp",
                ImageFormat::Gif => "image/gif",
                _ => "application/octet-stream",
            })
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}
