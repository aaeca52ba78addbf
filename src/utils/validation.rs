use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Lowercase text after the last `.` of the final path component.
///
/// `None` for names without a dot or ending in one.
pub fn file_extension(filename: &str) -> Option<String> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError {
            code: "EMPTY_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }
    Ok(())
}

pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<(), ValidationError> {
    let accepted = file_extension(filename)
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
        .unwrap_or(false);

    if accepted {
        return Ok(());
    }

    Err(ValidationError {
        code: "EXTENSION_NOT_ALLOWED",
        message: format!(
            "File type not allowed. Allowed types: {}",
            allowed.join(", ")
        ),
    })
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Full validation pipeline for uploaded files. Stops at the first violated rule.
pub fn validate_upload(
    filename: &str,
    size: usize,
    allowed_extensions: &[String],
    max_size: usize,
) -> Result<(), ValidationError> {
    validate_filename(filename)?;
    validate_extension(filename, allowed_extensions)?;
    validate_file_size(size, max_size)?;
    Ok(())
}

/// MIME type for a stored record: the client's claim, else magic bytes, else octet-stream.
pub fn detect_file_type(content_type: Option<&str>, content: &[u8]) -> String {
    let claimed = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .filter(|ct| !ct.is_empty());

    if let Some(ct) = claimed {
        return ct;
    }

    infer::get(content)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["exe", "pdf", "zip"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a.exe").as_deref(), Some("exe"));
        assert_eq!(file_extension("Report.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("dir/inner.zip").as_deref(), Some("zip"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("a.exe", &allowed()).is_ok());
        assert!(validate_extension("A.EXE", &allowed()).is_ok());

        let err = validate_extension("notes.txt", &allowed()).unwrap_err();
        assert_eq!(err.code, "EXTENSION_NOT_ALLOWED");
        assert!(err.message.contains("exe, pdf, zip"));

        assert!(validate_extension("noext", &allowed()).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        let max = 32 * 1024 * 1024;
        assert!(validate_file_size(0, max).is_ok());
        assert!(validate_file_size(max, max).is_ok());
        assert_eq!(
            validate_file_size(max + 1, max).unwrap_err().code,
            "FILE_TOO_LARGE"
        );
    }

    #[test]
    fn test_validate_upload_reports_first_violation() {
        assert_eq!(
            validate_upload("", 10, &allowed(), 100).unwrap_err().code,
            "EMPTY_FILENAME"
        );
        assert_eq!(
            validate_upload("big.txt", 1000, &allowed(), 100)
                .unwrap_err()
                .code,
            "EXTENSION_NOT_ALLOWED"
        );
        assert_eq!(
            validate_upload("big.exe", 1000, &allowed(), 100)
                .unwrap_err()
                .code,
            "FILE_TOO_LARGE"
        );
        assert!(validate_upload("ok.zip", 100, &allowed(), 100).is_ok());
    }

    #[test]
    fn test_detect_file_type() {
        assert_eq!(
            detect_file_type(Some("application/pdf; charset=binary"), b"x"),
            "application/pdf"
        );
        assert_eq!(
            detect_file_type(None, b"%PDF-1.7 rest of file"),
            "application/pdf"
        );
        assert_eq!(detect_file_type(Some(""), b"0123456789"), "application/octet-stream");
        assert_eq!(detect_file_type(None, b""), "application/octet-stream");
    }
}
