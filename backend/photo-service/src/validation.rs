/// Upload validation: type/size limits, magic-byte sniffing, filename hygiene
use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// MIME types accepted by the upload endpoint
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Limits applied to an upload batch
#[derive(Clone, Debug)]
pub struct UploadConstraints {
    pub max_file_size: u64,
    pub allowed_types: Vec<String>,
    pub max_files: usize,
}

impl UploadConstraints {
    pub fn new(max_file_size: u64, max_files: usize) -> Self {
        Self {
            max_file_size,
            allowed_types: ALLOWED_IMAGE_TYPES.iter().map(|s| s.to_string()).collect(),
            max_files,
        }
    }
}

/// One file extracted from the multipart payload
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Validate a single file against the constraints.
///
/// Content that fails the magic-byte check produces a generic "does not
/// appear to be a valid image" message regardless of which signature check
/// failed; short or unreadable content fails the same way (fail closed).
pub fn validate_file(file: &IncomingFile, constraints: &UploadConstraints) -> Result<(), String> {
    if file.data.len() as u64 > constraints.max_file_size {
        return Err(format!(
            "File is too large: {} (limit is {})",
            human_size(file.data.len() as u64),
            human_size(constraints.max_file_size)
        ));
    }

    if !constraints
        .allowed_types
        .iter()
        .any(|t| t == &file.content_type)
    {
        return Err(format!("File type {} is not allowed", file.content_type));
    }

    if !matches_image_signature(&file.data) {
        return Err("File does not appear to be a valid image".to_string());
    }

    Ok(())
}

/// Validate a whole batch. Returns one slot per input file, `None` meaning
/// valid. A batch over the file-count limit marks every entry invalid
/// without running per-file checks.
pub fn validate_files(
    files: &[IncomingFile],
    constraints: &UploadConstraints,
) -> Vec<Option<String>> {
    if files.len() > constraints.max_files {
        let msg = format!(
            "Too many files: {} (limit is {})",
            files.len(),
            constraints.max_files
        );
        return files.iter().map(|_| Some(msg.clone())).collect();
    }

    files
        .iter()
        .map(|file| validate_file(file, constraints).err())
        .collect()
}

/// True when the leading bytes carry a known JPEG, PNG, or WebP signature.
pub fn matches_image_signature(data: &[u8]) -> bool {
    if data.len() >= 3 && data[..3] == JPEG_SIGNATURE {
        return true;
    }
    if data.len() >= 8 && data[..8] == PNG_SIGNATURE {
        return true;
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return true;
    }
    false
}

/// Build a collision-resistant stored name: `<epoch-millis>-<6 rand>.<ext>`.
/// The extension is whatever follows the last dot (case preserved), or the
/// whole name when there is no dot.
pub fn generate_unique_filename(original: &str) -> String {
    let extension = match original.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => original,
    };

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();

    format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}

/// Lowercase and strip a user-supplied filename down to `[a-z0-9.-]`,
/// collapsing runs of replacement underscores.
pub fn sanitize_filename(original: &str) -> String {
    let mut out = String::with_capacity(original.len());
    let mut last_underscore = false;

    for c in original.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }

    out
}

/// Render a byte count in human units for validation messages.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_file(size: usize) -> IncomingFile {
        let mut data = vec![0u8; size.max(3)];
        data[..3].copy_from_slice(&JPEG_SIGNATURE);
        IncomingFile {
            filename: "photo.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            data: Bytes::from(data),
        }
    }

    fn constraints() -> UploadConstraints {
        UploadConstraints::new(10 * 1024 * 1024, 20)
    }

    #[test]
    fn test_oversized_file_names_both_sizes() {
        let file = jpeg_file(11 * 1024 * 1024);
        let err = validate_file(&file, &constraints()).unwrap_err();
        assert!(err.contains("11.0 MB"), "got: {err}");
        assert!(err.contains("10.0 MB"), "got: {err}");
    }

    #[test]
    fn test_disallowed_type_is_named() {
        let mut file = jpeg_file(100);
        file.content_type = "image/gif".to_string();
        let err = validate_file(&file, &constraints()).unwrap_err();
        assert!(err.contains("image/gif"));
    }

    #[test]
    fn test_magic_bytes_jpeg() {
        assert!(matches_image_signature(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
    }

    #[test]
    fn test_magic_bytes_png() {
        assert!(matches_image_signature(&PNG_SIGNATURE));
    }

    #[test]
    fn test_magic_bytes_webp() {
        let mut data = Vec::from(*b"RIFF");
        data.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        data.extend_from_slice(b"WEBP");
        assert!(matches_image_signature(&data));
    }

    #[test]
    fn test_magic_bytes_reject_uniformly() {
        let mut file = jpeg_file(100);
        file.data = Bytes::from_static(b"GIF89a not an allowed image");
        let err = validate_file(&file, &constraints()).unwrap_err();
        assert_eq!(err, "File does not appear to be a valid image");

        // Truncated content fails with the same message
        file.data = Bytes::from_static(&[0xFF]);
        let err = validate_file(&file, &constraints()).unwrap_err();
        assert_eq!(err, "File does not appear to be a valid image");
    }

    #[test]
    fn test_batch_count_short_circuits() {
        let files: Vec<IncomingFile> = (0..3).map(|_| jpeg_file(100)).collect();
        let mut c = constraints();
        c.max_files = 2;
        let results = validate_files(&files, &c);
        assert_eq!(results.len(), 3);
        for r in results {
            assert!(r.unwrap().contains("Too many files"));
        }
    }

    #[test]
    fn test_batch_reports_per_file() {
        let mut bad = jpeg_file(100);
        bad.content_type = "text/plain".to_string();
        let files = vec![jpeg_file(100), bad];
        let results = validate_files(&files, &constraints());
        assert!(results[0].is_none());
        assert!(results[1].as_ref().unwrap().contains("text/plain"));
    }

    #[test]
    fn test_unique_filename_shape() {
        let name = generate_unique_filename("photo.JPG");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "JPG", "extension case preserved");
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unique_filename_without_extension() {
        let name = generate_unique_filename("photo");
        assert!(name.ends_with(".photo"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My File!!.JPG"), "my_file_.jpg");
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("!!!"), "_");
        assert_eq!(sanitize_filename("a-b.c_9"), "a-b.c_9");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(10 * 1024 * 1024), "10.0 MB");
    }
}
