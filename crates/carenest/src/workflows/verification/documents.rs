use std::collections::BTreeMap;
use std::io::Cursor;

use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use axum::response::Response;

use super::domain::{DocumentSlot, StoredDocument};
use crate::error::{error_response, validation_response, FieldErrors};
use crate::identity::UserId;

const MEGABYTE: f64 = 1024.0 * 1024.0;
const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

/// Multipart framing allowance on top of the files themselves.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Headroom over the per-file total. Oversized parts are counted but not buffered, so
/// the body may run past the limit and still be answered with field errors.
const OVERSIZE_HEADROOM: usize = 4;

/// Raw uploaded file as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Bytes received; larger than `bytes.len()` when the part was not buffered.
    pub received_bytes: u64,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            received_bytes: bytes.len() as u64,
            bytes,
        }
    }

    /// A part that was counted but dropped because it ran past the size limit.
    pub fn oversized(file_name: impl Into<String>, received_bytes: u64) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: Vec::new(),
            received_bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.received_bytes
    }
}

/// The set of files submitted together, keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet {
    files: BTreeMap<DocumentSlot, DocumentUpload>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: DocumentSlot, upload: DocumentUpload) -> Self {
        self.insert(slot, upload);
        self
    }

    pub fn insert(&mut self, slot: DocumentSlot, upload: DocumentUpload) {
        self.files.insert(slot, upload);
    }

    pub fn get(&self, slot: DocumentSlot) -> Option<&DocumentUpload> {
        self.files.get(&slot)
    }

    pub fn missing(&self) -> Vec<DocumentSlot> {
        DocumentSlot::ALL
            .into_iter()
            .filter(|slot| !self.files.contains_key(slot))
            .collect()
    }
}

/// Acceptance rules for identity and certificate images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentPolicy {
    pub max_bytes: u64,
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

impl DocumentPolicy {
    /// Request body limit for a form carrying `files` images.
    pub fn body_limit(&self, files: usize) -> usize {
        usize::try_from(self.max_bytes)
            .unwrap_or(usize::MAX)
            .saturating_mul(files)
            .saturating_mul(OVERSIZE_HEADROOM)
            .saturating_add(FORM_OVERHEAD_BYTES)
    }

    pub fn size_limit_message(&self) -> String {
        format!(
            "Image file size must be less than {}MB",
            self.max_bytes as f64 / MEGABYTE
        )
    }

    /// Size, then extension, then whether the bytes decode as an image.
    pub fn check(&self, upload: &DocumentUpload) -> Result<(), String> {
        if upload.size() > self.max_bytes {
            return Err(format!(
                "{}. Current size: {:.2}MB",
                self.size_limit_message(),
                upload.size() as f64 / MEGABYTE
            ));
        }

        let file_name = upload.file_name.to_lowercase();
        if !ALLOWED_EXTENSIONS
            .iter()
            .any(|extension| file_name.ends_with(extension))
        {
            return Err(format!(
                "Invalid file type. Allowed types: JPEG, PNG, WebP. Got: {file_name}"
            ));
        }

        let decodable = image::io::Reader::new(Cursor::new(upload.bytes.as_slice()))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok())
            .is_some();
        if !decodable {
            return Err("File is not a valid image".to_string());
        }

        Ok(())
    }

    /// Validates a full submission, reporting every offending field.
    pub fn check_set(&self, documents: &DocumentSet) -> Result<(), FieldErrors> {
        let missing = documents.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|slot| slot.field_name()).collect();
            return Err(FieldErrors::single(
                "documents",
                format!("Missing required documents: {}", names.join(", ")),
            ));
        }

        let mut errors = FieldErrors::new();
        for slot in DocumentSlot::ALL {
            if let Some(upload) = documents.get(slot) {
                if let Err(message) = self.check(upload) {
                    errors.add(slot.field_name(), message);
                }
            }
        }
        errors.into_result()
    }
}

/// Object storage for uploaded images, addressed by key.
pub trait DocumentStore: Send + Sync {
    fn store(&self, key: String, upload: &DocumentUpload) -> Result<StoredDocument, StorageError>;

    /// Deletes the object; unknown keys are ignored.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("document storage unavailable: {0}")]
    Unavailable(String),
}

/// Key for a verification document, keeping the original extension.
pub(crate) fn storage_key(slot: DocumentSlot, owner: UserId, file_name: &str) -> String {
    object_key(
        slot.storage_prefix(),
        &format!("{owner}-{}", slot.field_name()),
        file_name,
    )
}

/// Collision-free `prefix/stem-uuid.ext` key.
pub(crate) fn object_key(prefix: &str, stem: &str, file_name: &str) -> String {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    format!(
        "{prefix}/{stem}-{}.{extension}",
        uuid::Uuid::new_v4().simple()
    )
}

/// Buffers at most `max_bytes` of a multipart part; anything longer is drained and
/// only counted.
pub(crate) async fn read_capped(
    field: &mut Field<'_>,
    file_name: String,
    max_bytes: u64,
) -> Result<DocumentUpload, MultipartError> {
    let mut bytes = Vec::new();
    let mut received: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        received = received.saturating_add(chunk.len() as u64);
        if received <= max_bytes {
            bytes.extend_from_slice(&chunk);
        } else if !bytes.is_empty() {
            bytes = Vec::new();
        }
    }

    if received > max_bytes {
        Ok(DocumentUpload::oversized(file_name, received))
    } else {
        Ok(DocumentUpload::new(file_name, bytes))
    }
}

/// Why a multipart upload could not be read.
pub(crate) enum UploadFailure {
    /// The body hit the route limit while reading the named field.
    BodyTooLarge(Option<&'static str>),
    Malformed(MultipartError),
}

impl UploadFailure {
    pub(crate) fn from_multipart(err: MultipartError, field: Option<&'static str>) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::BodyTooLarge(field)
        } else {
            Self::Malformed(err)
        }
    }

    /// An oversized body becomes a field error; framing problems keep axum's status.
    pub(crate) fn field_response(self, policy: &DocumentPolicy, fallback_field: &str) -> Response {
        match self {
            Self::BodyTooLarge(field) => validation_response(&FieldErrors::single(
                field.unwrap_or(fallback_field),
                policy.size_limit_message(),
            )),
            Self::Malformed(err) => error_response(err.status(), err.body_text()),
        }
    }
}

pub(crate) fn content_type_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
