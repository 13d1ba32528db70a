//! Payload naming: `<attachmentId><.ext>`.
//!
//! The extension comes from the server's file name (`Content-Disposition`),
//! then the final request URL, then the `Content-Type`. `.json` is reserved
//! for sidecars, so a payload that would end in `.json` is stored as `.bin`.

use url::Url;

use crate::store::is_plain_segment;

/// Longest extension accepted, dot included.
const MAX_EXTENSION_LEN: usize = 12;

/// Extension of sidecar files.
pub(crate) const SIDECAR_EXTENSION: &str = ".json";

/// Fallback extension.
const FALLBACK_EXTENSION: &str = ".bin";

/// True for ids that can prefix a payload name unambiguously.
///
/// Ids are single path segments without dots, so `<id>.<ext>` always splits
/// back into the same id.
pub(crate) fn is_valid_attachment_id(id: &str) -> bool {
    is_plain_segment(id) && !id.contains('.')
}

/// Attachment id encoded in a payload or sidecar name.
pub(crate) fn base_id(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Whether `file_name` belongs to `id`: exactly `id` or `id.<ext>`.
pub(crate) fn belongs_to(file_name: &str, id: &str) -> bool {
    file_name
        .strip_prefix(id)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Sidecar name for an attachment id.
pub(crate) fn sidecar_name(id: &str) -> String {
    format!("{id}{SIDECAR_EXTENSION}")
}

/// True for sidecar files.
pub(crate) fn is_sidecar(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(SIDECAR_EXTENSION)
}

/// Payload name for `id` with extension `ext` (leading dot included or empty).
pub(crate) fn payload_name(id: &str, ext: &str) -> String {
    let ext = if ext.eq_ignore_ascii_case(SIDECAR_EXTENSION) {
        FALLBACK_EXTENSION
    } else {
        ext
    };
    format!("{id}{ext}")
}

/// Picks the payload extension from the response metadata.
pub(crate) fn choose_extension(
    server_file_name: Option<&str>,
    final_url: &str,
    content_type: Option<&str>,
) -> String {
    server_file_name
        .and_then(extension_from_name)
        .or_else(|| extension_from_url(final_url))
        .or_else(|| content_type.and_then(extension_from_content_type))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Lower-cased `.ext` of a file name, if it has a plausible one.
pub(crate) fn extension_from_name(name: &str) -> Option<String> {
    let dot_index = name.rfind('.')?;
    let ext = &name[dot_index..];
    if ext.len() <= 1
        || ext.len() > MAX_EXTENSION_LEN
        || !ext[1..].chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Extension of the last path segment of `url`.
pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    extension_from_name(last_segment)
}

/// Last path segment of `url`, decoded.
pub(crate) fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    if last_segment.is_empty() {
        return None;
    }
    urlencoding::decode(last_segment)
        .ok()
        .map(std::borrow::Cow::into_owned)
}

/// Content types that say nothing about the payload format.
const GENERIC_CONTENT_TYPES: &[&str] = &[
    "",
    "application/octet-stream",
    "binary/octet-stream",
    "application/binary",
    "application/unknown",
    "application/x-download",
    "application/force-download",
];

/// Extension registered for a `Content-Type`.
///
/// Generic types yield `None`. For types outside the table, a registry
/// extension is accepted only if it maps back to the same type.
pub(crate) fn extension_from_content_type(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if GENERIC_CONTENT_TYPES.contains(&essence.as_str()) {
        return None;
    }
    let ext = match essence.as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/epub+zip" => "epub",
        "application/zip" => "zip",
        "audio/mpeg" => "mp3",
        "video/mp4" => "mp4",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "text/plain" => "txt",
        "text/html" => "html",
        other => mime_guess::get_mime_extensions_str(other)?
            .iter()
            .copied()
            .find(|ext| mime_guess::from_ext(ext).iter().any(|m| m.essence_str() == other))?,
    };
    Some(format!(".{ext}"))
}

/// Extracts the file name from a `Content-Disposition` header.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987, preferred)
///
/// Parameter names match case-insensitively.
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets valid for `header`.
    let lowered = header.to_ascii_lowercase();
    if let Some(pos) = lowered.find("filename*=") {
        let value = header[pos + "filename*=".len()..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = lowered.find("filename=")?;
    let value = header[pos + "filename=".len()..].trim();
    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        let name = &stripped[..end];
        return (!name.is_empty()).then(|| name.to_string());
    }
    let end = value.find(';').unwrap_or(value.len());
    let name = value[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}
