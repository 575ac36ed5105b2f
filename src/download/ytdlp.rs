//! yt-dlp backed `VideoPlatform`.
//!
//! Metadata comes from `yt-dlp -J`, media bytes from `yt-dlp -f <itag> -o -`
//! read straight off the child's stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lazy_regex::regex_is_match;
use serde::Deserialize;
use tokio::process::Command;

use crate::core::config;
use crate::core::process::{run_with_timeout, stderr_summary};
use crate::download::error::DownloadError;
use crate::download::platform::{MediaSource, MediaStream, Playlist, PlaylistEntry, RawEncoding, VideoPlatform};

/// JSON structure from yt-dlp -J for a single video
#[derive(Debug, Deserialize)]
struct YtdlpVideoJson {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<YtdlpFormatJson>,
}

#[derive(Debug, Deserialize)]
struct YtdlpFormatJson {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    tbr: Option<f64>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    format_note: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    audio_channels: Option<u32>,
}

/// JSON structure from yt-dlp -J --flat-playlist
#[derive(Debug, Deserialize)]
struct YtdlpPlaylistJson {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    entries: Vec<YtdlpEntryJson>,
}

#[derive(Debug, Deserialize)]
struct YtdlpEntryJson {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub struct YtDlpPlatform {
    bin: String,
    timeout: Duration,
    max_playlist_items: usize,
}

impl YtDlpPlatform {
    pub fn new(bin: impl Into<String>, timeout: Duration, max_playlist_items: usize) -> Self {
        Self {
            bin: bin.into(),
            timeout,
            max_playlist_items,
        }
    }

    pub fn from_config() -> Self {
        Self::new(
            config::YTDL_BIN.as_str(),
            config::download::ytdlp_timeout(),
            config::limits::MAX_PLAYLIST_ITEMS,
        )
    }

    async fn dump_json(&self, args: &[&str], url: &str) -> Result<String, DownloadError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .args(["--no-warnings", "--socket-timeout", "30"])
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = run_with_timeout(&mut cmd, self.timeout)
            .await
            .map_err(|e| DownloadError::Resolution(format!("failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(DownloadError::Resolution(stderr_summary(&output)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VideoPlatform for YtDlpPlatform {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn resolve_video(&self, url: &str) -> Result<MediaSource, DownloadError> {
        log::info!("🔎 Resolving video {}", url);
        let json = self.dump_json(&["-J", "--no-playlist"], url).await?;
        parse_video_json(&json, url)
    }

    async fn resolve_playlist(&self, url: &str) -> Result<Playlist, DownloadError> {
        log::info!("🔎 Resolving playlist {}", url);
        let json = self.dump_json(&["-J", "--flat-playlist"], url).await?;
        parse_playlist_json(&json, url, self.max_playlist_items)
    }

    async fn open_stream(&self, source: &MediaSource, encoding: &RawEncoding) -> Result<MediaStream, DownloadError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-f", &encoding.tag.to_string()])
            .args(["-o", "-", "--no-part", "--quiet", "--no-warnings"])
            .arg(&source.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| DownloadError::Stream(format!("failed to spawn {}: {}", self.bin, e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Stream("yt-dlp stdout is not captured".to_string()))?;

        Ok(MediaStream::from_child(stdout, child))
    }
}

/// Maps `yt-dlp -J` output of one video.
fn parse_video_json(json: &str, requested_url: &str) -> Result<MediaSource, DownloadError> {
    let video: YtdlpVideoJson = serde_json::from_str(json)
        .map_err(|e| DownloadError::Resolution(format!("unexpected yt-dlp output: {}", e)))?;

    let duration_ms = video.duration.map(|d| format!("{}", (d * 1000.0).round() as u64));
    let encodings = video
        .formats
        .iter()
        .filter_map(|f| raw_encoding(f, duration_ms.clone()))
        .collect();

    Ok(MediaSource {
        url: video.webpage_url.unwrap_or_else(|| requested_url.to_string()),
        title: video.title.unwrap_or_else(|| video.id.clone()),
        id: video.id,
        encodings,
    })
}

fn codec(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|c| !c.is_empty() && *c != "none")
}

/// Storyboards, manifests and non-numeric format IDs are skipped.
fn raw_encoding(f: &YtdlpFormatJson, approx_duration_ms: Option<String>) -> Option<RawEncoding> {
    let tag: u32 = f.format_id.parse().ok()?;
    let ext = f.ext.as_deref().unwrap_or_default();
    let vcodec = codec(&f.vcodec);
    let acodec = codec(&f.acodec);

    let (mime_type, quality_label) = match (vcodec, acodec) {
        (Some(v), a) => {
            let container = match ext {
                "mp4" => "video/mp4".to_string(),
                "3gp" => "video/3gpp".to_string(),
                other => format!("video/{}", other),
            };
            let codecs = match a {
                Some(a) => format!("{}, {}", v, a),
                None => v.to_string(),
            };
            (format!("{}; codecs=\"{}\"", container, codecs), video_quality(f))
        }
        (None, Some(a)) => {
            let container = match ext {
                "m4a" | "mp4" => "audio/mp4".to_string(),
                "mp3" => "audio/mpeg".to_string(),
                other => format!("audio/{}", other),
            };
            (format!("{}; codecs=\"{}\"", container, a), String::new())
        }
        (None, None) => return None,
    };

    let audio_channels = match acodec {
        Some(_) => f.audio_channels.unwrap_or(2),
        None => 0,
    };

    Some(RawEncoding {
        tag,
        mime_type,
        quality_label,
        bitrate: f.tbr.map(|kbps| (kbps * 1000.0).round() as u64).unwrap_or(0),
        average_bitrate: None,
        approx_duration_ms,
        content_length: f.filesize,
        audio_channels,
    })
}

/// "720p", "1080p60"; falls back to the frame height
fn video_quality(f: &YtdlpFormatJson) -> String {
    match f.format_note.as_deref() {
        Some(note) if regex_is_match!(r"^\d+p\d*$", note) => note.to_string(),
        _ => f.height.map(|h| format!("{}p", h)).unwrap_or_default(),
    }
}

/// Maps `yt-dlp -J --flat-playlist` output, keeping at most `max_items` entries.
fn parse_playlist_json(json: &str, requested_url: &str, max_items: usize) -> Result<Playlist, DownloadError> {
    let playlist: YtdlpPlaylistJson = serde_json::from_str(json)
        .map_err(|e| DownloadError::Resolution(format!("unexpected yt-dlp output: {}", e)))?;

    let mut entries: Vec<PlaylistEntry> = playlist
        .entries
        .into_iter()
        .filter_map(|e| {
            let id = e.id?;
            Some(PlaylistEntry {
                title: e.title.unwrap_or_else(|| id.clone()),
                id,
            })
        })
        .collect();

    if entries.is_empty() {
        return Err(DownloadError::Resolution("No videos found in playlist".to_string()));
    }

    let truncated = entries.len() > max_items;
    entries.truncate(max_items);

    Ok(Playlist {
        title: playlist.title.unwrap_or_else(|| playlist.id.clone()),
        url: playlist.webpage_url.unwrap_or_else(|| requested_url.to_string()),
        id: playlist.id,
        entries,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VIDEO_JSON: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "duration": 212.5,
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "tbr": 129.5, "filesize": 3433514, "audio_channels": 2},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "tbr": 135.0},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "tbr": 500.1, "format_note": "360p", "height": 360},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "tbr": 4000.0, "format_note": "Premium", "height": 1080}
        ]
    }"#;

    #[test]
    fn maps_formats() {
        let source = parse_video_json(VIDEO_JSON, "https://youtu.be/dQw4w9WgXcQ").unwrap();

        assert_eq!(source.id, "dQw4w9WgXcQ");
        assert_eq!(source.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        let tags: Vec<u32> = source.encodings.iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec![140, 251, 18, 137]);

        let m4a = source.encoding(140).unwrap();
        assert_eq!(m4a.mime_type, "audio/mp4; codecs=\"mp4a.40.2\"");
        assert_eq!(m4a.content_length, Some(3433514));
        assert_eq!(m4a.bitrate, 129_500);
        assert_eq!(m4a.approx_duration_ms.as_deref(), Some("212500"));
        assert_eq!(m4a.quality_label, "");

        let muxed = source.encoding(18).unwrap();
        assert_eq!(muxed.mime_type, "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"");
        assert_eq!(muxed.quality_label, "360p");
        assert_eq!(muxed.audio_channels, 2);

        let silent = source.encoding(137).unwrap();
        assert_eq!(silent.quality_label, "1080p");
        assert_eq!(silent.audio_channels, 0);
        assert_eq!(source.encoding(251).unwrap().mime_type, "audio/webm; codecs=\"opus\"");
    }

    #[test]
    fn playlist_is_capped() {
        let json = r#"{
            "id": "PL123",
            "title": "Mix",
            "entries": [
                {"id": "a", "title": "First"},
                {"id": "b"},
                {"title": "no id"},
                {"id": "c", "title": "Third"}
            ]
        }"#;

        let playlist = parse_playlist_json(json, "https://youtube.com/playlist?list=PL123", 2).unwrap();

        assert_eq!(playlist.url, "https://youtube.com/playlist?list=PL123");
        assert_eq!(
            playlist.entries,
            vec![
                PlaylistEntry {
                    id: "a".into(),
                    title: "First".into()
                },
                PlaylistEntry {
                    id: "b".into(),
                    title: "b".into()
                },
            ]
        );
        assert!(playlist.truncated);
    }

    #[test]
    fn empty_playlist_is_a_resolution_error() {
        let err = parse_playlist_json(r#"{"id": "PL", "entries": []}"#, "u", 50).unwrap_err();
        assert!(matches!(err, DownloadError::Resolution(_)));
    }

    #[test]
    fn garbage_is_a_resolution_error() {
        assert!(matches!(
            parse_video_json("not json", "u"),
            Err(DownloadError::Resolution(_))
        ));
    }
}
