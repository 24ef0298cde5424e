//! Receives receipt uploads: checks them against the upload policy and writes
//! them to the temporary receipt area under a collision-free name.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::extract::{Multipart, multipart::Field};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

/// The multipart field that carries the receipt file.
pub const RECEIPT_FIELD: &str = "receipt";
/// The multipart field that carries the ID of the user uploading the receipt.
pub const USER_ID_FIELD: &str = "userId";
/// The default size ceiling for receipt files, 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const RECEIPT_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "application/pdf",
];

/// The rules an uploaded file must follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// The form field the file must be sent under.
    pub field_name: &'static str,
    /// The declared content types that are accepted.
    pub allowed_content_types: &'static [&'static str],
    /// The largest accepted file, in bytes. A file of exactly this size is accepted.
    pub max_bytes: u64,
}

impl UploadPolicy {
    /// The policy for receipt uploads with a custom size ceiling.
    pub fn receipts(max_bytes: u64) -> Self {
        Self {
            field_name: RECEIPT_FIELD,
            allowed_content_types: &RECEIPT_CONTENT_TYPES,
            max_bytes,
        }
    }

    /// Whether files declared as `content_type` may be uploaded.
    ///
    /// Parameters such as `; charset=...` are ignored and the comparison is
    /// case-insensitive.
    pub fn allows(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        self.allowed_content_types.contains(&essence.as_str())
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::receipts(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

/// A file that passed the upload policy and is held in memory until it is
/// written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingFile {
    /// The file name sent by the client.
    pub original_name: String,
    /// The content type declared by the client.
    pub content_type: String,
    /// The file contents.
    pub data: Vec<u8>,
}

/// The fields of a receipt upload form.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptForm {
    /// The raw user ID, validated later so input errors are reported in a
    /// consistent order.
    pub user_id: Option<String>,
    /// The receipt file.
    pub file: IncomingFile,
}

/// Read a receipt upload form, enforcing `policy` while the file streams in.
///
/// Fields other than the receipt and the user ID are ignored.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidFileType] if the receipt's declared content type is not allowed,
/// - [Error::FileTooLarge] as soon as more than `policy.max_bytes` bytes have been read,
/// - [Error::TooManyFiles] if more than one receipt was sent,
/// - [Error::MissingFile] if no receipt was sent,
/// - or [Error::MultipartError] if the form could not be read.
pub async fn read_receipt_form(
    multipart: &mut Multipart,
    policy: &UploadPolicy,
) -> Result<ReceiptForm, Error> {
    let mut user_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::debug!("Could not read multipart form field: {error}");
        Error::MultipartError(error.body_text())
    })? {
        let name = field.name().map(str::to_owned);

        match name.as_deref() {
            Some(name) if name == policy.field_name => {
                if file.is_some() {
                    return Err(Error::TooManyFiles);
                }

                file = Some(read_file_field(field, policy).await?);
            }
            Some(USER_ID_FIELD) => {
                let text = field.text().await.map_err(|error| {
                    tracing::debug!("Could not read the user ID field: {error}");
                    Error::MultipartError(error.body_text())
                })?;
                user_id = Some(text);
            }
            other => tracing::debug!("Ignoring multipart field {other:?}"),
        }
    }

    let file = file.ok_or(Error::MissingFile)?;

    Ok(ReceiptForm { user_id, file })
}

async fn read_file_field(mut field: Field<'_>, policy: &UploadPolicy) -> Result<IncomingFile, Error> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_owned();

    if !policy.allows(&content_type) {
        return Err(Error::InvalidFileType(content_type));
    }

    let original_name = field.file_name().unwrap_or(policy.field_name).to_owned();
    let mut data = Vec::new();

    while let Some(chunk) = field.chunk().await.map_err(|error| {
        tracing::debug!("Could not read data from multipart form field: {error}");
        Error::MultipartError(error.body_text())
    })? {
        if (data.len() + chunk.len()) as u64 > policy.max_bytes {
            return Err(Error::FileTooLarge {
                limit: policy.max_bytes,
            });
        }

        data.extend_from_slice(&chunk);
    }

    tracing::debug!(
        "Received file '{}' ({}) that is {} bytes",
        original_name,
        content_type,
        data.len()
    );

    Ok(IncomingFile {
        original_name,
        content_type,
        data,
    })
}

/// A receipt file that has been written to the temporary receipt area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// The generated file name, unique across uploads.
    pub filename: String,
    /// The form field the file was sent under.
    pub field_name: String,
    /// The content type declared by the client.
    pub content_type: String,
    /// The size of the file in bytes.
    pub size: u64,
    /// The absolute path of the stored file.
    pub path: PathBuf,
    /// The file name sent by the client.
    pub original_name: String,
    /// Hex encoded SHA-256 digest of the file contents.
    pub sha256: String,
}

/// The directory receipts are written to.
#[derive(Debug, Clone)]
pub struct ReceiptStorage {
    dir: PathBuf,
}

impl ReceiptStorage {
    /// Create the receipt directory if it does not exist and resolve it to an
    /// absolute path.
    ///
    /// Call this once at start up.
    ///
    /// # Errors
    /// Returns an [Error::StorageError] if the directory cannot be created.
    pub fn initialize(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();

        std::fs::create_dir_all(&dir)
            .and_then(|_| dir.canonicalize())
            .map(|dir| Self { dir })
            .map_err(|error| {
                tracing::error!("Could not create receipt directory {}: {error}", dir.display());
                Error::StorageError(format!("{}: {error}", dir.display()))
            })
    }

    /// The absolute path of the receipt directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `file` to the receipt directory under a newly generated name.
    ///
    /// If the directory was removed while the server was running, it is
    /// created again.
    ///
    /// # Errors
    /// Returns an [Error::StorageError] if the file cannot be written.
    pub async fn store(
        &self,
        file: IncomingFile,
        now: OffsetDateTime,
        field_name: &str,
    ) -> Result<UploadedFile, Error> {
        let filename = generate_filename(field_name, now, &file.original_name, &file.content_type);
        let path = self.dir.join(&filename);
        let sha256 = format!("{:x}", Sha256::digest(&file.data));

        let written = match tokio::fs::write(&path, &file.data).await {
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    "Receipt directory {} is missing, creating it again",
                    self.dir.display()
                );
                match tokio::fs::create_dir_all(&self.dir).await {
                    Ok(()) => tokio::fs::write(&path, &file.data).await,
                    Err(error) => Err(error),
                }
            }
            result => result,
        };

        if let Err(error) = written {
            tracing::error!("Could not write receipt to {}: {error}", path.display());
            remove_partial_file(&path).await;
            return Err(Error::StorageError(error.to_string()));
        }

        Ok(UploadedFile {
            filename,
            field_name: field_name.to_owned(),
            content_type: file.content_type,
            size: file.data.len() as u64,
            path,
            original_name: file.original_name,
            sha256,
        })
    }
}

/// Remove whatever a failed write left at `path`.
async fn remove_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partly written receipt {}", path.display()),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(
            "Could not remove partly written receipt {}: {error}",
            path.display()
        ),
    }
}

/// Build a file name from the form field, the upload time in milliseconds,
/// and a random suffix, keeping the extension of the original file.
fn generate_filename(
    field_name: &str,
    now: OffsetDateTime,
    original_name: &str,
    content_type: &str,
) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple();

    match file_extension(original_name, content_type) {
        Some(extension) => format!("{field_name}-{millis}-{suffix}.{extension}"),
        None => format!("{field_name}-{millis}-{suffix}"),
    }
}

fn file_extension(original_name: &str, content_type: &str) -> Option<String> {
    let from_name = Path::new(original_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .filter(|extension| {
            !extension.is_empty()
                && extension.len() <= 8
                && extension.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase);

    from_name.or_else(|| {
        let extension = match content_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "application/pdf" => "pdf",
            _ => return None,
        };
        Some(extension.to_owned())
    })
}
