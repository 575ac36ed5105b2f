//! Request flow from an incoming link to a delivered file.
//!
//! ```text
//! Received -> Classified -> AwaitingSelection -> Downloading -> Delivering -> Done
//!                                                                          \-> Failed
//! ```
//!
//! Link handling answers with a selection prompt. Pressing a button starts a
//! download; delivery (and whole playlist batches) continue in a spawned task
//! whose `JoinHandle` is handed back to the caller. Every failure is logged and
//! reported to the chat once, nothing propagates to the dispatcher.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use unic_langid::LanguageIdentifier;

use crate::core::error::{AppError, AppResult};
use crate::core::traffic::{TrafficLedger, UserRef};
use crate::core::utils::bytes_to_mb;
use crate::download::catalog::{best_audio, best_muxed_video, best_video_track, build_catalog};
use crate::download::error::DownloadError;
use crate::download::estimate::estimate_size;
use crate::download::fetcher::MediaFetcher;
use crate::download::platform::{MediaKind, MediaSource, Playlist, PlaylistEntry, RawEncoding};
use crate::download::temp::TempFile;
use crate::i18n;
use crate::telegram::classify::{classify, LinkKind};
use crate::telegram::delivery::deliver;
use crate::telegram::keyboard::{extract_link_line, format_keyboard, playlist_keyboard, prompt_text};
use crate::telegram::messenger::{ChatRef, MessageRef, Messenger};
use crate::telegram::selection::{Selection, SelectionError};

/// Platform messages that mean the link itself is broken
const INVALID_LINK_MARKERS: [&str; 5] = [
    "invalid characters in video id",
    "Incomplete YouTube ID",
    "is not a valid URL",
    "Unsupported URL",
    "Video unavailable",
];
const TOO_LARGE_MARKER: &str = "Request Entity Too Large";

/// Who asked, where to answer, and in which language
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub chat: ChatRef,
    /// Message replies are attached to: the link message, or the prompt
    /// whose button was pressed
    pub message: MessageRef,
    pub user: UserRef,
    pub lang: LanguageIdentifier,
}

/// Canned chat replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    FileTooLarge,
    InvalidLink,
    FormatUnavailable,
    TrafficLimit,
    SendingFailed,
    Generic,
}

impl Notice {
    pub fn key(self) -> &'static str {
        match self {
            Notice::FileTooLarge => "file-too-large",
            Notice::InvalidLink => "invalid-link",
            Notice::FormatUnavailable => "format-error",
            Notice::TrafficLimit => "traffic-limit",
            Notice::SendingFailed => "sending-error",
            Notice::Generic => "something-went-wrong",
        }
    }
}

/// User-facing category of a failure
pub fn notice_for(err: &AppError) -> Notice {
    match err {
        AppError::Download(DownloadError::TooLarge { .. }) => Notice::FileTooLarge,
        AppError::Selection(_) => Notice::FormatUnavailable,
        other => {
            let text = other.to_string();
            if text.contains(TOO_LARGE_MARKER) {
                Notice::FileTooLarge
            } else if INVALID_LINK_MARKERS.iter().any(|m| text.contains(m)) {
                Notice::InvalidLink
            } else {
                Notice::Generic
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Classified,
    AwaitingSelection,
    Downloading,
    Delivering,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a spawned job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Delivered { bytes: u64 },
    Failed(Notice),
    Batch(BatchReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub stopped_by_quota: bool,
}

enum BatchStep {
    Delivered,
    Failed,
    QuotaExceeded,
}

/// How one playlist entry is fetched
enum FetchPlan<'a> {
    Single(&'a RawEncoding),
    Composite { video: &'a RawEncoding, audio: &'a RawEncoding },
}

impl FetchPlan<'_> {
    fn size_mb(&self) -> f64 {
        let bytes = match self {
            FetchPlan::Single(e) => estimate_size(e).ok(),
            FetchPlan::Composite { video, audio } => estimate_size(video)
                .ok()
                .zip(estimate_size(audio).ok())
                .map(|(v, a)| v + a),
        };
        bytes.map(bytes_to_mb).unwrap_or(0.0)
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    messenger: Arc<dyn Messenger>,
    fetcher: Arc<MediaFetcher>,
    ledger: Arc<TrafficLedger>,
}

impl Orchestrator {
    pub fn new(messenger: Arc<dyn Messenger>, fetcher: Arc<MediaFetcher>, ledger: Arc<TrafficLedger>) -> Self {
        Self {
            messenger,
            fetcher,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<TrafficLedger> {
        &self.ledger
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    fn stage(&self, ctx: &RequestContext, stage: Stage, detail: &str) {
        log::debug!("[chat {}] {} {}", ctx.chat.0, stage, detail);
    }

    /// Answers a text message with a selection prompt.
    ///
    /// Returns false when the text holds no YouTube link.
    pub async fn handle_link(&self, ctx: &RequestContext, text: &str) -> bool {
        let Some(link) = classify(text) else {
            return false;
        };
        log::info!("🔗 {:?} from {} in chat {}", link, ctx.user.username, ctx.chat.0);
        self.stage(ctx, Stage::Classified, link.url());

        let result = match &link {
            LinkKind::Playlist(url) => self.prompt_playlist(ctx, url).await,
            LinkKind::Video(url) | LinkKind::Live(url) => match self.fetcher.resolve_media(url).await {
                Ok(source) => self.prompt_formats(ctx, &source).await,
                Err(e) => Err(e.into()),
            },
        };
        if let Err(e) = result {
            self.report_failure(ctx, &e, None).await;
        }
        true
    }

    /// Acts on a pressed button. `prompt` is the text of the message that
    /// carried the keyboard.
    pub async fn handle_selection(
        &self,
        ctx: &RequestContext,
        data: &str,
        prompt: Option<&str>,
    ) -> Option<JoinHandle<JobOutcome>> {
        let result = match Selection::parse(data) {
            Ok(Selection::Format { url, tag }) => self.start_format(ctx, &url, tag).await,
            Ok(Selection::PlaylistAll(kind)) => self.start_batch(ctx, prompt, kind).await.map(Some),
            Ok(Selection::PlaylistEntry(id)) => self.prompt_entry(ctx, prompt, &id).await.map(|()| None),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(handle) => handle,
            Err(e) => {
                self.report_failure(ctx, &e, None).await;
                None
            }
        }
    }

    async fn prompt_formats(&self, ctx: &RequestContext, source: &MediaSource) -> AppResult<()> {
        let catalog = build_catalog(source);
        if catalog.is_empty() {
            return Err(DownloadError::Resolution(format!("no deliverable formats for {}", source.url)).into());
        }
        let rows = format_keyboard(&catalog)?;
        self.messenger
            .send_keyboard(
                ctx.chat,
                Some(ctx.message),
                &prompt_text(&ctx.lang, &source.url, false),
                rows,
            )
            .await?;
        self.stage(ctx, Stage::AwaitingSelection, &source.url);
        Ok(())
    }

    async fn prompt_playlist(&self, ctx: &RequestContext, url: &str) -> AppResult<()> {
        let playlist = self.fetcher.resolve_playlist(url).await?;
        let rows = playlist_keyboard(&ctx.lang, &playlist)?;

        let mut text = prompt_text(&ctx.lang, &playlist.url, true);
        if playlist.truncated {
            text.push('\n');
            text.push_str(&i18n::t(&ctx.lang, "playlist-truncated"));
        }
        self.messenger.send_keyboard(ctx.chat, Some(ctx.message), &text, rows).await?;
        self.stage(ctx, Stage::AwaitingSelection, &playlist.url);
        Ok(())
    }

    async fn playlist_from_prompt(&self, prompt: Option<&str>) -> AppResult<Playlist> {
        let url = prompt
            .and_then(extract_link_line)
            .ok_or_else(|| SelectionError::Malformed("prompt carries no playlist link".to_string()))?;
        Ok(self.fetcher.resolve_playlist(url).await?)
    }

    async fn prompt_entry(&self, ctx: &RequestContext, prompt: Option<&str>, id: &str) -> AppResult<()> {
        let playlist = self.playlist_from_prompt(prompt).await?;
        let entry = playlist
            .entry(id)
            .ok_or_else(|| DownloadError::Resolution(format!("{} is not part of {}", id, playlist.url)))?;
        let source = self.fetcher.resolve_playlist_entry(entry).await?;
        self.prompt_formats(ctx, &source).await
    }

    async fn start_format(&self, ctx: &RequestContext, url: &str, tag: u32) -> AppResult<Option<JoinHandle<JobOutcome>>> {
        let source = self.fetcher.resolve_media(url).await?;
        let catalog = build_catalog(&source);
        let (Some(entry), Some(raw)) = (catalog.iter().find(|e| e.encoding.tag == tag), source.encoding(tag)) else {
            log::warn!("itag {} is no longer offered for {}", tag, url);
            self.notify(ctx, Notice::FormatUnavailable).await;
            return Ok(None);
        };

        if !self
            .ledger
            .check_quota(&ctx.user, entry.size_mb.unwrap_or(0.0))
            .await
            .is_allowed()
        {
            self.notify(ctx, Notice::TrafficLimit).await;
            return Ok(None);
        }

        let status = self
            .messenger
            .send_reply_text(ctx.chat, ctx.message, &i18n::t(&ctx.lang, "downloading"))
            .await?;
        self.stage(ctx, Stage::Downloading, &entry.label);

        let fetched = if entry.encoding.needs_mux() {
            self.fetcher.fetch_composite(&source, &raw.quality_label).await
        } else {
            self.fetcher.fetch_single(&source, raw).await
        };
        let path = match fetched {
            Ok(path) => path,
            Err(e) => {
                self.report_failure(ctx, &AppError::from(e), Some(status)).await;
                return Ok(None);
            }
        };

        let this = self.clone();
        let ctx = ctx.clone();
        Ok(Some(tokio::spawn(async move { this.deliver_job(&ctx, status, path).await })))
    }

    /// Sends the file, records usage when it went through and removes it.
    async fn deliver_job(&self, ctx: &RequestContext, status: MessageRef, path: PathBuf) -> JobOutcome {
        self.edit_status(ctx, status, "sending").await;
        self.stage(ctx, Stage::Delivering, &path.display().to_string());

        match deliver(self.messenger.as_ref(), ctx.chat, Some(ctx.message), TempFile::new(path)).await {
            Ok(delivered) => {
                // Already sent: report, never roll back
                if let Err(e) = self.ledger.record_usage(&ctx.user, delivered.bytes).await {
                    log::error!("Failed to record traffic of {}: {}", ctx.user.username, e);
                    self.notify_key(ctx, "traffic-update-error").await;
                }
                self.stage(ctx, Stage::Done, &delivered.file.path().display().to_string());
                JobOutcome::Delivered {
                    bytes: delivered.bytes,
                }
            }
            Err(e) => {
                let notice = match notice_for(&e) {
                    Notice::Generic => Notice::SendingFailed,
                    other => other,
                };
                log::error!("❌ Delivery to chat {} failed: {}", ctx.chat.0, e);
                self.stage(ctx, Stage::Failed, notice.key());
                self.edit_status(ctx, status, notice.key()).await;
                JobOutcome::Failed(notice)
            }
        }
    }

    async fn start_batch(
        &self,
        ctx: &RequestContext,
        prompt: Option<&str>,
        kind: MediaKind,
    ) -> AppResult<JoinHandle<JobOutcome>> {
        let playlist = self.playlist_from_prompt(prompt).await?;
        log::info!(
            "📚 Batch {:?} download of {} ({} entries) for {}",
            kind,
            playlist.url,
            playlist.entries.len(),
            ctx.user.username
        );

        let this = self.clone();
        let ctx = ctx.clone();
        Ok(tokio::spawn(async move {
            JobOutcome::Batch(this.run_batch(&ctx, &playlist, kind).await)
        }))
    }

    async fn run_batch(&self, ctx: &RequestContext, playlist: &Playlist, kind: MediaKind) -> BatchReport {
        let mut report = BatchReport::default();
        for entry in &playlist.entries {
            match self.batch_item(ctx, entry, kind).await {
                Ok(BatchStep::Delivered) => report.delivered += 1,
                Ok(BatchStep::Failed) => report.failed += 1,
                Ok(BatchStep::QuotaExceeded) => {
                    self.notify(ctx, Notice::TrafficLimit).await;
                    report.stopped_by_quota = true;
                    break;
                }
                Err(e) => {
                    log::warn!("Skipping {} of {}: {}", entry.id, playlist.url, e);
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "📚 Batch {} done: {} delivered, {} failed, quota stop: {}",
            playlist.url,
            report.delivered,
            report.failed,
            report.stopped_by_quota
        );
        report
    }

    async fn batch_item(&self, ctx: &RequestContext, entry: &PlaylistEntry, kind: MediaKind) -> AppResult<BatchStep> {
        let source = self.fetcher.resolve_playlist_entry(entry).await?;
        let plan = match kind {
            MediaKind::Audio => best_audio(&source).map(FetchPlan::Single),
            MediaKind::Video => best_muxed_video(&source).map(FetchPlan::Single).or_else(|| {
                best_video_track(&source, "")
                    .zip(best_audio(&source))
                    .map(|(video, audio)| FetchPlan::Composite { video, audio })
            }),
        }
        .ok_or_else(|| DownloadError::Resolution(format!("no {:?} rendition for {}", kind, source.url)))?;

        if !self.ledger.check_quota(&ctx.user, plan.size_mb()).await.is_allowed() {
            return Ok(BatchStep::QuotaExceeded);
        }

        let status = self
            .messenger
            .send_reply_text(
                ctx.chat,
                ctx.message,
                &format!("{} {}", i18n::t(&ctx.lang, "downloading"), source.title),
            )
            .await?;
        self.stage(ctx, Stage::Downloading, &source.url);

        let fetched = match plan {
            FetchPlan::Single(encoding) => self.fetcher.fetch_single(&source, encoding).await,
            FetchPlan::Composite { video, .. } => self.fetcher.fetch_composite(&source, &video.quality_label).await,
        };
        let path = match fetched {
            Ok(path) => path,
            Err(e) => {
                let e = AppError::from(e);
                self.edit_status(ctx, status, notice_for(&e).key()).await;
                return Err(e);
            }
        };

        Ok(match self.deliver_job(ctx, status, path).await {
            JobOutcome::Delivered { .. } => BatchStep::Delivered,
            _ => BatchStep::Failed,
        })
    }

    async fn report_failure(&self, ctx: &RequestContext, err: &AppError, status: Option<MessageRef>) {
        let notice = notice_for(err);
        match err {
            AppError::Download(e) => log::error!(
                "❌ [{}{}] chat {}: {}",
                e.subcategory(),
                if e.is_permanent() { ", permanent" } else { "" },
                ctx.chat.0,
                e
            ),
            other => log::error!("❌ chat {}: {}", ctx.chat.0, other),
        }
        self.stage(ctx, Stage::Failed, notice.key());

        match status {
            Some(message) => self.edit_status(ctx, message, notice.key()).await,
            None => self.notify(ctx, notice).await,
        }
    }

    async fn notify(&self, ctx: &RequestContext, notice: Notice) {
        self.notify_key(ctx, notice.key()).await;
    }

    async fn notify_key(&self, ctx: &RequestContext, key: &str) {
        if let Err(e) = self
            .messenger
            .send_reply_text(ctx.chat, ctx.message, &i18n::t(&ctx.lang, key))
            .await
        {
            log::warn!("Failed to notify chat {}: {}", ctx.chat.0, e);
        }
    }

    async fn edit_status(&self, ctx: &RequestContext, status: MessageRef, key: &str) {
        if let Err(e) = self
            .messenger
            .edit_text(ctx.chat, status, &i18n::t(&ctx.lang, key))
            .await
        {
            log::warn!("Failed to update status message in chat {}: {}", ctx.chat.0, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_categories() {
        let too_large = AppError::from(DownloadError::TooLarge {
            estimated: 3,
            limit: 2,
        });
        assert_eq!(notice_for(&too_large), Notice::FileTooLarge);

        let bad_id = AppError::from(DownloadError::Resolution(
            "ERROR: [youtube] abc: Incomplete YouTube ID abc".into(),
        ));
        assert_eq!(notice_for(&bad_id), Notice::InvalidLink);

        let unsupported = AppError::from(DownloadError::Resolution("ERROR: Unsupported URL: https://x".into()));
        assert_eq!(notice_for(&unsupported), Notice::InvalidLink);

        let entity = AppError::Validation("Request Entity Too Large".into());
        assert_eq!(notice_for(&entity), Notice::FileTooLarge);

        let malformed = AppError::from(SelectionError::Malformed("x".into()));
        assert_eq!(notice_for(&malformed), Notice::FormatUnavailable);

        let mux = AppError::from(DownloadError::Mux("ffmpeg exited with 1".into()));
        assert_eq!(notice_for(&mux), Notice::Generic);
    }
}
