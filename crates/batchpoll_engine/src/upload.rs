use crate::ApiError;

/// File types the service accepts for upload.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["txt", "pdf", "wav", "mp3", "amr"];

/// The service refuses uploads larger than 50 MB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Applies the service's upload rules locally so a doomed upload never leaves
/// the machine. Messages match the ones the service would send.
pub fn check_upload(filename: &str, size: u64) -> Result<(), ApiError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase());
    if !extension.is_some_and(|extension| ALLOWED_EXTENSIONS.contains(&extension.as_str())) {
        return Err(ApiError::UploadRejected(format!(
            "File type not allowed. Supported types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ApiError::UploadRejected(
            "File size exceeds 50MB limit".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_upload, MAX_UPLOAD_BYTES};
    use crate::ApiError;

    #[test]
    fn accepts_known_types_case_insensitively() {
        assert_eq!(check_upload("call.WAV", 1024), Ok(()));
        assert_eq!(check_upload("notes.tar.txt", 0), Ok(()));
        assert_eq!(check_upload("max.mp3", MAX_UPLOAD_BYTES), Ok(()));
    }

    #[test]
    fn rejects_unknown_or_missing_extension() {
        for name in ["movie.mkv", "README", "trailing."] {
            let err = check_upload(name, 10).unwrap_err();
            assert!(
                matches!(&err, ApiError::UploadRejected(message) if message.starts_with("File type not allowed")),
                "{name}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_oversized_file() {
        assert_eq!(
            check_upload("big.pdf", MAX_UPLOAD_BYTES + 1),
            Err(ApiError::UploadRejected(
                "File size exceeds 50MB limit".to_string()
            ))
        );
    }
}
