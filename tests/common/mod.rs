//! Common test utilities
//!
//! In-memory stand-ins for the chat, the video platform, ffmpeg and the
//! profile service, shared across all integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ytdrop::core::error::AppError;
use ytdrop::core::traffic::{LedgerSettings, TrafficLedger, UserRef};
use ytdrop::download::error::DownloadError;
use ytdrop::download::fetcher::{FetcherSettings, MediaFetcher};
use ytdrop::download::mux::Muxer;
use ytdrop::download::platform::{MediaSource, MediaStream, Playlist, RawEncoding, VideoPlatform};
use ytdrop::i18n;
use ytdrop::storage::profile::{ProfileError, ProfileStore, UserRecord};
use ytdrop::telegram::messenger::{ChatRef, FileKind, KeyboardButton, MessageRef, Messenger};
use ytdrop::telegram::orchestrator::{Orchestrator, RequestContext};

pub const MB: u64 = 1024 * 1024;
pub const VIDEO_ID: &str = "dQw4w9WgXcQ";

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

// ----------------------------------------------------------------------------
// Chat
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        reply_to: Option<MessageRef>,
        text: String,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
    Keyboard {
        text: String,
        rows: Vec<Vec<KeyboardButton>>,
    },
    File {
        kind: FileKind,
        path: PathBuf,
        caption: String,
        bytes: u64,
    },
}

/// Records every outbound call; `send_file` can be told to fail
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    pub fail_files: AtomicBool,
    next_id: AtomicI32,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, item: Sent) -> MessageRef {
        self.sent.lock().unwrap().push(item);
        MessageRef(1000 + self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<(FileKind, PathBuf, String, u64)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::File {
                    kind,
                    path,
                    caption,
                    bytes,
                } => Some((kind, path, caption, bytes)),
                _ => None,
            })
            .collect()
    }

    pub fn keyboards(&self) -> Vec<(String, Vec<Vec<KeyboardButton>>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Keyboard { text, rows } => Some((text, rows)),
                _ => None,
            })
            .collect()
    }

    /// True when a message with the localized text of `key` was sent or edited in
    pub fn said(&self, key: &str) -> bool {
        let expected = i18n::t(&i18n::lang_from_code(Some("en")), key);
        self.texts().iter().any(|t| t.contains(&expected))
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, _chat: ChatRef, text: &str) -> Result<MessageRef, AppError> {
        Ok(self.push(Sent::Text {
            reply_to: None,
            text: text.to_string(),
        }))
    }

    async fn send_reply_text(&self, _chat: ChatRef, reply_to: MessageRef, text: &str) -> Result<MessageRef, AppError> {
        Ok(self.push(Sent::Text {
            reply_to: Some(reply_to),
            text: text.to_string(),
        }))
    }

    async fn edit_text(&self, _chat: ChatRef, message: MessageRef, text: &str) -> Result<(), AppError> {
        self.push(Sent::Edit {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_keyboard(
        &self,
        _chat: ChatRef,
        _reply_to: Option<MessageRef>,
        text: &str,
        rows: Vec<Vec<KeyboardButton>>,
    ) -> Result<MessageRef, AppError> {
        Ok(self.push(Sent::Keyboard {
            text: text.to_string(),
            rows,
        }))
    }

    async fn send_file(
        &self,
        _chat: ChatRef,
        _reply_to: Option<MessageRef>,
        kind: FileKind,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, AppError> {
        if self.fail_files.load(Ordering::SeqCst) {
            return Err(AppError::Validation("upload rejected".into()));
        }
        let bytes = std::fs::metadata(path)?.len();
        Ok(self.push(Sent::File {
            kind,
            path: path.to_path_buf(),
            caption: caption.to_string(),
            bytes,
        }))
    }
}

// ----------------------------------------------------------------------------
// Video platform
// ----------------------------------------------------------------------------

pub fn encoding(tag: u32, mime: &str, quality: &str, size: u64, channels: u32, bitrate: u64) -> RawEncoding {
    RawEncoding {
        tag,
        mime_type: mime.to_string(),
        quality_label: quality.to_string(),
        bitrate,
        average_bitrate: None,
        approx_duration_ms: Some("60000".to_string()),
        content_length: Some(size),
        audio_channels: channels,
    }
}

/// Muxed 360p (18), silent 720p (136), audio/mp4 (140), audio/webm (251)
pub fn typical_encodings() -> Vec<RawEncoding> {
    vec![
        encoding(18, "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"", "360p", 10 * MB, 2, 500_000),
        encoding(136, "video/mp4; codecs=\"avc1.4d401f\"", "720p", 20 * MB, 0, 1_500_000),
        encoding(140, "audio/mp4; codecs=\"mp4a.40.2\"", "", 3 * MB, 2, 128_000),
        encoding(251, "audio/webm; codecs=\"opus\"", "", 3 * MB, 2, 160_000),
    ]
}

pub fn media_source(id: &str, title: &str, encodings: Vec<RawEncoding>) -> MediaSource {
    MediaSource {
        url: watch_url(id),
        id: id.to_string(),
        title: title.to_string(),
        encodings,
    }
}

/// Serves registered videos and playlists; every stream yields a short
/// payload tagged with the itag
#[derive(Default)]
pub struct FakePlatform {
    pub videos: Mutex<HashMap<String, MediaSource>>,
    pub playlists: Mutex<HashMap<String, Playlist>>,
    pub resolved: Mutex<Vec<String>>,
    pub streams_opened: AtomicUsize,
}

impl FakePlatform {
    pub fn add_video(&self, source: MediaSource) {
        self.videos.lock().unwrap().insert(source.url.clone(), source);
    }

    pub fn add_playlist(&self, playlist: Playlist) {
        self.playlists.lock().unwrap().insert(playlist.url.clone(), playlist);
    }

    pub fn payload(tag: u32) -> Vec<u8> {
        format!("itag-{}-payload", tag).into_bytes()
    }
}

#[async_trait]
impl VideoPlatform for FakePlatform {
    fn name(&self) -> &str {
        "fake"
    }

    async fn resolve_video(&self, url: &str) -> Result<MediaSource, DownloadError> {
        self.resolved.lock().unwrap().push(url.to_string());
        self.videos
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::Resolution(format!("ERROR: [youtube] Video unavailable: {}", url)))
    }

    async fn resolve_playlist(&self, url: &str) -> Result<Playlist, DownloadError> {
        self.playlists
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::Resolution(format!("no playlist at {}", url)))
    }

    async fn open_stream(&self, _source: &MediaSource, encoding: &RawEncoding) -> Result<MediaStream, DownloadError> {
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MediaStream::from_reader(Cursor::new(Self::payload(encoding.tag))))
    }
}

/// Concatenates video and audio into the output, or fails on demand
#[derive(Default)]
pub struct FakeMuxer {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Muxer for FakeMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DownloadError::Mux("ffmpeg exited with 1".into()));
        }
        let mut bytes = tokio::fs::read(video).await?;
        bytes.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Profile service
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProfileStore {
    pub users: Mutex<HashMap<String, UserRecord>>,
    pub fail: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
}

impl InMemoryProfileStore {
    pub fn with_user(record: UserRecord) -> Self {
        let store = Self::default();
        store.users.lock().unwrap().insert(record.username.clone(), record);
        store
    }

    pub fn traffic(&self, username: &str) -> Option<f64> {
        self.users.lock().unwrap().get(username).map(|u| u.traffic)
    }

    pub fn record(&self, username: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().get(username).cloned()
    }

    async fn gate(&self) -> Result<(), ProfileError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProfileError::Status {
                status: 503,
                endpoint: "/users".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn create_user(&self, user: &UserRecord) -> Result<(), ProfileError> {
        self.gate().await?;
        self.users
            .lock()
            .unwrap()
            .entry(user.username.clone())
            .or_insert_with(|| user.clone());
        Ok(())
    }

    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, ProfileError> {
        self.gate().await?;
        Ok(self.users.lock().unwrap().get(username).cloned())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, ProfileError> {
        self.gate().await?;
        Ok(self.users.lock().unwrap().contains_key(username))
    }

    async fn update_traffic(&self, username: &str, traffic_mb: f64) -> Result<(), ProfileError> {
        self.gate().await?;
        match self.users.lock().unwrap().get_mut(username) {
            Some(user) => {
                user.traffic = traffic_mb;
                Ok(())
            }
            None => Err(ProfileError::Status {
                status: 404,
                endpoint: format!("/users/{}/traffic", username),
            }),
        }
    }

    async fn update_user(&self, user: &UserRecord) -> Result<(), ProfileError> {
        self.gate().await?;
        self.users.lock().unwrap().insert(user.username.clone(), user.clone());
        Ok(())
    }
}

pub fn ledger_settings() -> LedgerSettings {
    LedgerSettings {
        plan_limit_mb: 5000.0,
        call_timeout: Duration::from_secs(2),
        payment_timeout: Duration::from_secs(4),
    }
}

// ----------------------------------------------------------------------------
// Wiring
// ----------------------------------------------------------------------------

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub messenger: Arc<RecordingMessenger>,
    pub platform: Arc<FakePlatform>,
    pub muxer: Arc<FakeMuxer>,
    pub store: Arc<InMemoryProfileStore>,
    pub fetcher: Arc<MediaFetcher>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(InMemoryProfileStore::default())
    }

    pub fn with_store(store: InMemoryProfileStore) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::default());
        let platform = Arc::new(FakePlatform::default());
        let muxer = Arc::new(FakeMuxer::default());
        let store = Arc::new(store);

        let fetcher = Arc::new(MediaFetcher::new(
            platform.clone(),
            muxer.clone(),
            FetcherSettings {
                download_dir: dir.path().join("download"),
                max_file_size: 2 * 1024 * MB,
            },
        ));
        let ledger = Arc::new(TrafficLedger::new(store.clone(), ledger_settings()));
        let orchestrator = Orchestrator::new(messenger.clone(), fetcher.clone(), ledger);

        Self {
            dir,
            messenger,
            platform,
            muxer,
            store,
            fetcher,
            orchestrator,
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.fetcher.settings().download_dir.clone()
    }

    /// Files left in the download directory
    pub fn leftovers(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.download_dir()) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn ctx(username: &str) -> RequestContext {
    RequestContext {
        chat: ChatRef(42),
        message: MessageRef(7),
        user: UserRef::new(username, 42),
        lang: i18n::lang_from_code(Some("en")),
    }
}
