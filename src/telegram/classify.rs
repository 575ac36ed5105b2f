//! Recognising YouTube links in incoming text.

use lazy_regex::regex_is_match;
use url::Url;

const YOUTUBE_HOSTS: [&str; 4] = ["youtube.com", "www.youtube.com", "m.youtube.com", "music.youtube.com"];
const SHORT_HOST: &str = "youtu.be";

/// What a link points at, with the URL to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Video(String),
    /// `/live/<id>` rewritten to the watch form
    Live(String),
    Playlist(String),
}

impl LinkKind {
    pub fn url(&self) -> &str {
        match self {
            LinkKind::Video(url) | LinkKind::Live(url) | LinkKind::Playlist(url) => url,
        }
    }
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

fn parse_youtube(candidate: &str) -> Option<Url> {
    let url = Url::parse(candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_lowercase();
    (YOUTUBE_HOSTS.contains(&host.as_str()) || host == SHORT_HOST).then_some(url)
}

fn is_video_id(id: &str) -> bool {
    regex_is_match!(r"^[A-Za-z0-9_-]{6,20}$", id)
}

/// Classifies the first YouTube URL in `text`.
///
/// Priority: live alias, then playlist page, then single video. Video URLs
/// are canonicalised to `https://www.youtube.com/watch?v=<id>` when an ID can
/// be extracted and kept verbatim otherwise, so the platform decides.
pub fn classify(text: &str) -> Option<LinkKind> {
    let (raw, url) = text
        .split_whitespace()
        .find_map(|token| parse_youtube(token).map(|url| (token, url)))?;

    let host = url.host_str().unwrap_or_default().to_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };

    if host == SHORT_HOST {
        return Some(match segments.first() {
            Some(id) if is_video_id(id) => LinkKind::Video(watch_url(id)),
            _ => LinkKind::Video(raw.to_string()),
        });
    }

    match segments.as_slice() {
        ["live", id, ..] if is_video_id(id) => Some(LinkKind::Live(watch_url(id))),
        ["playlist"] => match query("list") {
            Some(list) => Some(LinkKind::Playlist(format!(
                "https://www.youtube.com/playlist?list={}",
                list
            ))),
            None => Some(LinkKind::Video(raw.to_string())),
        },
        ["watch"] => match query("v") {
            Some(id) if is_video_id(&id) => Some(LinkKind::Video(watch_url(&id))),
            _ => Some(LinkKind::Video(raw.to_string())),
        },
        ["shorts" | "embed", id, ..] if is_video_id(id) => Some(LinkKind::Video(watch_url(id))),
        _ => Some(LinkKind::Video(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn live_alias_is_rewritten() {
        assert_eq!(
            classify("https://www.youtube.com/live/AbCdEfGhIjK?si=xyz"),
            Some(LinkKind::Live("https://www.youtube.com/watch?v=AbCdEfGhIjK".into()))
        );
    }

    #[test]
    fn playlist_page() {
        assert_eq!(
            classify("look https://youtube.com/playlist?list=PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG&si=1"),
            Some(LinkKind::Playlist(
                "https://www.youtube.com/playlist?list=PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG".into()
            ))
        );
    }

    #[test]
    fn video_forms_are_canonicalised() {
        let expected = Some(LinkKind::Video("https://www.youtube.com/watch?v=dQw4w9WgXcQ".into()));
        assert_eq!(classify("https://youtu.be/dQw4w9WgXcQ?t=42"), expected);
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123"),
            expected
        );
        assert_eq!(classify("https://m.youtube.com/shorts/dQw4w9WgXcQ"), expected);
    }

    #[test]
    fn odd_video_urls_pass_through() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=bad*id"),
            Some(LinkKind::Video("https://www.youtube.com/watch?v=bad*id".into()))
        );
    }

    #[test]
    fn non_youtube_text() {
        assert_eq!(classify("hello there"), None);
        assert_eq!(classify("https://vimeo.com/12345"), None);
        assert_eq!(classify("ftp://youtube.com/watch?v=dQw4w9WgXcQ"), None);
    }
}
