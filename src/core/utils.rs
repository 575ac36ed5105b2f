/// Bytes in one megabyte as shown to users and stored in the profile service.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Longest title kept in a file name, in bytes
const MAX_TITLE_BYTES: usize = 150;

/// Converts a byte count to megabytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Turns a media title into something safe to use as a file name.
///
/// Path separators, reserved characters and control characters are removed,
/// runs of whitespace collapse to a single space, and leading/trailing dots
/// are stripped. Long titles are cut on a character boundary.
///
/// # Example
///
/// ```
/// use ytdrop::core::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("AC/DC: Live  at <River> Plate?"), "ACDC Live at River Plate");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let mut result = String::with_capacity(title.len());

    for c in title.chars() {
        match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => {}
            c if c.is_control() => result.push(' '),
            _ => result.push(c),
        }
    }

    let collapsed = result.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || c == '.');

    let mut cut = trimmed;
    if cut.len() > MAX_TITLE_BYTES {
        let mut end = MAX_TITLE_BYTES;
        while !cut.is_char_boundary(end) {
            end -= 1;
        }
        cut = cut[..end].trim_end();
    }

    if cut.is_empty() {
        "unnamed".to_string()
    } else {
        cut.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("song/name"), "songname");
        assert_eq!(sanitize_title("path\\to\\file"), "pathtofile");
        assert_eq!(sanitize_title("a:b*c?d<e>f|g\"h"), "abcdefgh");
        assert_eq!(sanitize_title("  many    spaces\there "), "many spaces here");
        assert_eq!(sanitize_title("...dots..."), "dots");
        assert_eq!(sanitize_title(""), "unnamed");
        assert_eq!(sanitize_title("???"), "unnamed");
        assert_eq!(sanitize_title("Кино - Группа крови"), "Кино - Группа крови");
    }

    #[test]
    fn test_sanitize_title_truncates_on_char_boundary() {
        let long = "я".repeat(200);
        let cut = sanitize_title(&long);
        assert!(cut.len() <= MAX_TITLE_BYTES);
        assert!(cut.chars().all(|c| c == 'я'));
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(5 * 1024 * 1024 / 2), 2.5);
    }
}
