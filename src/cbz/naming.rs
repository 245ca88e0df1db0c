/// Raster formats kept as-is when naming archive entries.
const KNOWN_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

const DEFAULT_EXTENSION: &str = "jpg";

/// Image extension for a page URL.
///
/// Takes the last dot-delimited suffix of the URL before any query string
/// or fragment; anything outside the known raster set becomes `jpg`.
///
/// ```
/// use mangacbz::cbz::infer_extension;
///
/// assert_eq!(infer_extension("https://img.example/c001/02.PNG?token=1"), "png");
/// assert_eq!(infer_extension("https://img.example/c001/02"), "jpg");
/// ```
pub fn infer_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let suffix = match path.rsplit_once('.') {
        Some((_, suffix)) => suffix,
        None => return DEFAULT_EXTENSION,
    };

    KNOWN_EXTENSIONS
        .iter()
        .find(|ext| ext.eq_ignore_ascii_case(suffix))
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Entry name for the page at 0-based `position` in a chapter of `total`
/// pages: a zero-padded 1-based number, at least three digits wide, so
/// readers sort pages correctly regardless of locale.
pub fn page_file_name(position: usize, total: usize, url: &str) -> String {
    let width = total.max(1).to_string().len().max(3);
    format!("{:0width$}.{}", position + 1, infer_extension(url))
}

/// Archive file name for a chapter, e.g. `one_piece_c001.cbz`.
pub fn cbz_file_name(manga_id: &str, chapter_id: &str) -> String {
    let sanitize = |s: &str| s.replace(['/', '\\'], "_");
    format!("{}_{}.cbz", sanitize(manga_id), sanitize(chapter_id))
}

/// Format a byte size into a human-readable string.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
