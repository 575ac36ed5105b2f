//! Video platform abstraction.
//!
//! `VideoPlatform` is the seam between the download pipeline and whatever
//! actually talks to YouTube. Production uses `YtDlpPlatform`; tests plug in
//! an in-memory fake.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::Child;

use crate::download::error::DownloadError;

/// Whether an encoding carries pictures or only sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Classifies a MIME type such as `video/mp4; codecs="avc1.64001F"`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime_essence(mime);
        if essence.starts_with("video/") {
            Some(MediaKind::Video)
        } else if essence.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

/// `video/mp4; codecs="..."` -> `video/mp4`
pub fn mime_essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// One rendition exactly as the platform describes it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawEncoding {
    /// Platform format identifier (itag)
    pub tag: u32,
    /// Full MIME type, possibly with a codecs parameter
    pub mime_type: String,
    /// e.g. "720p", "1080p60"; empty for audio
    pub quality_label: String,
    /// Nominal bitrate, bits per second
    pub bitrate: u64,
    /// Average bitrate, bits per second, when the platform knows it
    pub average_bitrate: Option<u64>,
    /// Duration in milliseconds as text, the way the platform sends it
    pub approx_duration_ms: Option<String>,
    /// Exact size in bytes when declared
    pub content_length: Option<u64>,
    pub audio_channels: u32,
}

impl RawEncoding {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime_type)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_channels > 0
    }

    /// Bitrate used for ranking, preferring the average one
    pub fn effective_bitrate(&self) -> u64 {
        match self.average_bitrate {
            Some(avg) if avg > 0 => avg,
            _ => self.bitrate,
        }
    }
}

/// Resolved metadata of one video.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    /// Canonical watch URL
    pub url: String,
    /// Platform video ID
    pub id: String,
    pub title: String,
    /// Renditions in platform order
    pub encodings: Vec<RawEncoding>,
}

impl MediaSource {
    pub fn encoding(&self, tag: u32) -> Option<&RawEncoding> {
        self.encodings.iter().find(|e| e.tag == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
}

impl PlaylistEntry {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub url: String,
    pub entries: Vec<PlaylistEntry>,
    /// Set when the platform listed more entries than we keep
    pub truncated: bool,
}

impl Playlist {
    pub fn entry(&self, id: &str) -> Option<&PlaylistEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

/// Byte stream of one encoding.
///
/// When the bytes come from a child process, `finish` waits for it and turns
/// a non-zero exit into an error, so a truncated transfer is never mistaken
/// for a complete one.
pub struct MediaStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    child: Option<Child>,
}

impl MediaStream {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            child: None,
        }
    }

    pub fn from_child<R>(reader: R, child: Child) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            child: Some(child),
        }
    }

    pub fn reader(&mut self) -> &mut Pin<Box<dyn AsyncRead + Send>> {
        &mut self.reader
    }

    /// Waits for the producing process, if any.
    pub async fn finish(self) -> Result<(), DownloadError> {
        let Some(mut child) = self.child else {
            return Ok(());
        };
        drop(self.reader);
        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(DownloadError::Stream(format!("downloader exited with {}", status)))
        }
    }
}

/// Everything the pipeline needs from the video platform.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Metadata and renditions of one video.
    async fn resolve_video(&self, url: &str) -> Result<MediaSource, DownloadError>;

    /// Entries of a playlist, without per-entry renditions.
    async fn resolve_playlist(&self, url: &str) -> Result<Playlist, DownloadError>;

    /// Full metadata of one playlist entry.
    async fn resolve_playlist_entry(&self, entry: &PlaylistEntry) -> Result<MediaSource, DownloadError> {
        self.resolve_video(&entry.watch_url()).await
    }

    /// Opens the byte stream of one rendition.
    async fn open_stream(&self, source: &MediaSource, encoding: &RawEncoding) -> Result<MediaStream, DownloadError>;
}
