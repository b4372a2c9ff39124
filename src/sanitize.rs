pub const DEFAULT_UPLOADER: &str = "unknown_user";
pub const DEFAULT_TITLE: &str = "tiktok_video";
pub const MAX_TITLE_CHARS: usize = 50;
pub const OUTPUT_EXTENSION: &str = "mp4";

const ILLEGAL_FILENAME_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Drops characters common filesystems reject. No trimming, no length cap.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|character| !ILLEGAL_FILENAME_CHARS.contains(character))
        .collect()
}

pub fn sanitize_title(title: &str) -> String {
    sanitize(title.trim())
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

pub fn derive_filename(uploader: &str, title: &str) -> String {
    format!(
        "{}({}).{OUTPUT_EXTENSION}",
        sanitize_uploader(uploader),
        sanitize_title(title)
    )
}

// Joined onto the work dir: no separators may survive.
fn sanitize_uploader(uploader: &str) -> String {
    let cleaned = sanitize(uploader);
    if cleaned.is_empty() {
        DEFAULT_UPLOADER.to_string()
    } else {
        cleaned
    }
}

pub fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{safe_ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

pub fn sanitize_ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric()
                || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
            {
                character
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        format!("video.{OUTPUT_EXTENSION}")
    } else {
        compact.to_string()
    }
}
