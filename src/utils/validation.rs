use crate::api::error::AppError;
use std::path::Path;

/// Longest file-name component kept after sanitising
const MAX_NAME_LEN: usize = 120;

/// Extensions a browser would render as a document able to run script.
const SCRIPTABLE_EXTENSIONS: &[&str] = &["svg", "svgz", "html", "htm", "xhtml", "xml"];

#[derive(Debug, Clone)]
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

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.message)
    }
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

/// Validates that the declared content type is a raster image.
///
/// `image/svg+xml` is refused: uploads are served from the API's own origin
/// and an SVG can carry script.
pub fn validate_image_type(content_type: Option<&str>) -> Result<(), ValidationError> {
    let declared = content_type.unwrap_or("");
    let parsed = declared.parse::<mime::Mime>().ok();

    if parsed.as_ref().is_some_and(|m| m.subtype() == mime::SVG) {
        return Err(ValidationError {
            code: "SVG_NOT_ALLOWED",
            message: "SVG images are not accepted".to_string(),
        });
    }

    if parsed.is_some_and(|m| m.type_() == mime::IMAGE) {
        Ok(())
    } else {
        Err(ValidationError {
            code: "INVALID_MIME_TYPE",
            message: format!(
                "Content type '{}' is not allowed. Only images can be uploaded.",
                declared
            ),
        })
    }
}

/// Rejects content whose magic bytes identify a non-image format.
///
/// Formats `infer` cannot identify pass on the declared type.
pub fn verify_image_bytes(data: &[u8]) -> Result<(), ValidationError> {
    if data.is_empty() {
        return Err(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        });
    }

    match infer::get(data) {
        Some(kind) if kind.matcher_type() != infer::MatcherType::Image => Err(ValidationError {
            code: "MIME_MISMATCH",
            message: format!("File content is '{}', not an image", kind.mime_type()),
        }),
        _ => Ok(()),
    }
}

/// Refuses names `ServeDir` would hand back as SVG or markup, whatever the
/// declared type was.
pub fn validate_image_extension(filename: &str) -> Result<(), ValidationError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if SCRIPTABLE_EXTENSIONS.contains(&ext.as_str()) => Err(ValidationError {
            code: "INVALID_EXTENSION",
            message: format!("Files ending in .{} cannot be uploaded as images", ext),
        }),
        _ => Ok(()),
    }
}

/// Reduces a client-supplied file name to a URL-safe component.
///
/// Directory parts are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// `_`, and leading dots are removed so no hidden files are produced.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_start_matches('.');

    let sanitized = if sanitized.len() > MAX_NAME_LEN {
        // Keep the extension when truncating
        match sanitized.rfind('.') {
            Some(dot) if sanitized.len() - dot <= 10 => {
                let ext = &sanitized[dot..];
                format!("{}{}", &sanitized[..MAX_NAME_LEN - ext.len()], ext)
            }
            _ => sanitized[..MAX_NAME_LEN].to_string(),
        }
    } else {
        sanitized.to_string()
    };

    if sanitized.is_empty() {
        "image".to_string()
    } else {
        sanitized
    }
}
