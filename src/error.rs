use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Network(String),

    #[error("Extraction request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from extraction service: {0}")]
    InvalidResponse(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Extraction did not finish after {attempts} poll attempts. Try again.")]
    PollTimeout { attempts: u32 },

    #[error("{0}")]
    UnsupportedFile(String),

    #[error("{0}")]
    Session(String),

    #[error("{0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => AppError::Io("File not found.".to_string()),
            std::io::ErrorKind::PermissionDenied => {
                AppError::Io("Permission denied. Is the file open in another program?".to_string())
            }
            _ => AppError::Io(format!("I/O error: {}", e)),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            AppError::Network("Check your internet connection and try again.".to_string())
        } else if e.is_decode() {
            AppError::InvalidResponse(e.to_string())
        } else {
            AppError::Network(format!("Network error: {}", e))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InvalidResponse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_short_message() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.to_string(), "File not found.");
    }

    #[test]
    fn api_error_includes_status() {
        let err = AppError::Api {
            status: 401,
            message: "Invalid API key?".to_string(),
        };
        assert_eq!(err.to_string(), "Extraction request failed (401): Invalid API key?");
    }
}
