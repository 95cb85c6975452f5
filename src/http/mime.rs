//! Content type lookup by file extension.

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("gif", "image/gif"),
    ("txt", "text/plain"),
    ("mp3", "audio/mpeg3"),
    ("wav", "audio/wav"),
    ("flac", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("ttf", "application/x-font-ttf"),
    ("ttc", "application/x-font-ttf"),
];

/// Content type for `filename`, judged by the text after its last dot.
///
/// The dot must come after the last `/`, otherwise (or for an unknown
/// extension) the default `text/html` is returned. Matching ignores case.
///
/// ```
/// # use smoothie_net::http::mime::content_type;
/// assert_eq!(content_type("/sd/www/style.CSS"), "text/css");
/// assert_eq!(content_type("/sd/v1.2/README"), "text/html");
/// ```
pub fn content_type(filename: &str) -> &'static str {
    let dot = filename.rfind('.');
    let slash = filename.rfind('/');

    let ext = match (dot, slash) {
        (Some(d), Some(s)) if d > s => &filename[d + 1..],
        (Some(d), None) => &filename[d + 1..],
        _ => return DEFAULT_CONTENT_TYPE,
    };

    CONTENT_TYPES
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map_or(DEFAULT_CONTENT_TYPE, |&(_, t)| t)
}
