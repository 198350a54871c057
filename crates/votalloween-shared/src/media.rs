//! Image allow-list shared by the server (enforcement) and the client
//! (early rejection before an upload is attempted).

const ALLOWED_IMAGE_TYPES: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

/// Return the lowercase extension of `file_name` if both the extension and
/// the declared media type are on the image allow-list.
///
/// Both checks must pass: a `.txt` file declared as `image/png` is rejected,
/// and so is a `.png` file declared as `text/plain`.
pub fn allowed_image_extension(file_name: &str, content_type: &str) -> Option<String> {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();

    if !ALLOWED_IMAGE_TYPES.contains(&ext.as_str()) {
        return None;
    }

    let subtype = content_type
        .trim()
        .to_ascii_lowercase()
        .strip_prefix("image/")?
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    if !ALLOWED_IMAGE_TYPES.contains(&subtype.as_str()) {
        return None;
    }

    Some(ext)
}

/// Best-effort media type for a stored file extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
