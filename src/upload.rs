use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};

/// Upload types the intake accepts.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// An uploaded document: original file name plus its raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read and validate a document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        validate_document_file(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::UnsupportedFile("Invalid file name.".to_string()))?
            .to_string();
        let bytes = fs::read(path)?;
        Ok(Self { name, bytes })
    }

    /// Transport-safe encoding of the file content for the extraction request.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Check extension, size and magic bytes before a file enters the queue.
pub fn validate_document_file(path: &Path) -> Result<()> {
    let ext = extension_of(path).unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::UnsupportedFile(format!(
            "Unsupported file type '{}'. Upload a PDF, JPG, JPEG or PNG.",
            path.display()
        )));
    }
    if !path.exists() {
        return Err(AppError::Io("File not found.".to_string()));
    }
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::UnsupportedFile("File too large (max 50MB).".to_string()));
    }

    let mut header = [0u8; 8];
    let read = {
        use std::io::Read;
        let mut f = fs::File::open(path)?;
        f.read(&mut header)?
    };
    validate_signature(&ext, &header[..read])
}

fn validate_signature(ext: &str, header: &[u8]) -> Result<()> {
    let ok = match ext {
        "pdf" => header.starts_with(PDF_SIGNATURE),
        "jpg" | "jpeg" => header.starts_with(JPEG_SIGNATURE),
        "png" => header.starts_with(PNG_SIGNATURE),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::UnsupportedFile(format!(
            "Not a valid {} file.",
            ext.to_uppercase()
        )))
    }
}
