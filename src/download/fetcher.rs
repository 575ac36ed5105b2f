//! Resolving media and writing renditions to disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs_err::tokio as fs;
use tokio::io::AsyncWriteExt;

use crate::core::config;
use crate::core::utils::sanitize_title;
use crate::download::catalog::{best_audio, best_video_track};
use crate::download::error::DownloadError;
use crate::download::estimate::estimate_size;
use crate::download::mux::Muxer;
use crate::download::platform::{mime_essence, MediaSource, Playlist, PlaylistEntry, RawEncoding, VideoPlatform};
use crate::download::progress::{ProgressReader, TransferProgress};
use crate::download::temp::TempFile;

/// Extension used when the container is not recognised
pub const DEFAULT_EXTENSION: &str = ".mov";

/// File extension for a MIME type (parameters are ignored).
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime_essence(mime) {
        "video/mp4" => ".mp4",
        "audio/mp4" => ".m4a",
        "video/webm" => ".webm",
        "audio/webm" => ".weba",
        "video/3gpp" => ".3gp",
        "audio/mpeg" => ".mp3",
        "video/x-flv" => ".flv",
        "video/quicktime" => ".mov",
        _ => DEFAULT_EXTENSION,
    }
}

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub download_dir: PathBuf,
    pub max_file_size: u64,
}

impl FetcherSettings {
    pub fn from_config() -> Self {
        Self {
            download_dir: PathBuf::from(config::DOWNLOAD_DIR.as_str()),
            max_file_size: config::limits::MAX_FILE_SIZE_BYTES,
        }
    }
}

pub struct MediaFetcher {
    platform: Arc<dyn VideoPlatform>,
    muxer: Arc<dyn Muxer>,
    settings: FetcherSettings,
}

impl MediaFetcher {
    pub fn new(platform: Arc<dyn VideoPlatform>, muxer: Arc<dyn Muxer>, settings: FetcherSettings) -> Self {
        Self {
            platform,
            muxer,
            settings,
        }
    }

    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    pub async fn resolve_media(&self, url: &str) -> Result<MediaSource, DownloadError> {
        log::info!("🔎 Resolving {} via {}", url, self.platform.name());
        self.platform.resolve_video(url).await
    }

    pub async fn resolve_playlist(&self, url: &str) -> Result<Playlist, DownloadError> {
        log::info!("🔎 Resolving playlist {} via {}", url, self.platform.name());
        self.platform.resolve_playlist(url).await
    }

    pub async fn resolve_playlist_entry(&self, entry: &PlaylistEntry) -> Result<MediaSource, DownloadError> {
        self.platform.resolve_playlist_entry(entry).await
    }

    /// `<download_dir>/<title> [<itag>]<ext>`
    pub fn canonical_path(&self, source: &MediaSource, encoding: &RawEncoding) -> PathBuf {
        let name = format!(
            "{} [{}]{}",
            sanitize_title(&source.title),
            encoding.tag,
            extension_for_mime(&encoding.mime_type)
        );
        self.settings.download_dir.join(name)
    }

    /// Downloads one rendition as-is.
    ///
    /// Returns the canonical path; an existing file there is reused.
    pub async fn fetch_single(&self, source: &MediaSource, encoding: &RawEncoding) -> Result<PathBuf, DownloadError> {
        let estimated = self.check_size(source, std::slice::from_ref(encoding))?;

        let dest = self.canonical_path(source, encoding);
        if is_file(&dest).await {
            log::info!("♻️ Reusing {} for {}", dest.display(), source.url);
            return Ok(dest);
        }

        fs::create_dir_all(&self.settings.download_dir).await?;
        let partial = self.scratch_path("part");
        self.download_to(source, encoding, partial.path(), estimated).await?;

        fs::rename(partial.path(), &dest).await?;
        partial.keep();
        log::info!("✅ Downloaded itag {} of {} to {}", encoding.tag, source.url, dest.display());
        Ok(dest)
    }

    /// Downloads the best silent video track matching `quality_hint` and the
    /// best audio track in parallel, then muxes them without re-encoding.
    pub async fn fetch_composite(&self, source: &MediaSource, quality_hint: &str) -> Result<PathBuf, DownloadError> {
        let (video, audio) = match (best_video_track(source, quality_hint), best_audio(source)) {
            (Some(v), Some(a)) => (v, a),
            _ => {
                return Err(DownloadError::Mux(format!(
                    "no video/audio format found after filtering (quality {:?})",
                    quality_hint
                )))
            }
        };
        self.check_size(source, &[video.clone(), audio.clone()])?;

        let dest = self.canonical_path(source, video);
        if is_file(&dest).await {
            log::info!("♻️ Reusing {} for {}", dest.display(), source.url);
            return Ok(dest);
        }

        fs::create_dir_all(&self.settings.download_dir).await?;
        let video_tmp = self.scratch_path("m4v");
        let audio_tmp = self.scratch_path("m4a");
        let muxed_tmp = self.scratch_path("mp4");

        log::info!(
            "⬇️ Composite download of {}: video itag {} + audio itag {}",
            source.url,
            video.tag,
            audio.tag
        );
        tokio::try_join!(
            self.download_to(source, video, video_tmp.path(), estimate_size(video).ok()),
            self.download_to(source, audio, audio_tmp.path(), estimate_size(audio).ok()),
        )?;

        self.muxer
            .mux(video_tmp.path(), audio_tmp.path(), muxed_tmp.path())
            .await?;

        fs::rename(muxed_tmp.path(), &dest).await?;
        muxed_tmp.keep();
        log::info!("✅ Muxed {} to {}", source.url, dest.display());
        Ok(dest)
    }

    /// Sum of the estimates, rejected upfront when over the ceiling.
    /// Unknown sizes pass.
    fn check_size(&self, source: &MediaSource, encodings: &[RawEncoding]) -> Result<Option<u64>, DownloadError> {
        let mut total = 0u64;
        for encoding in encodings {
            match estimate_size(encoding) {
                Ok(size) => total += size,
                Err(e) => {
                    log::warn!("Size check skipped for {}: {}", source.url, e);
                    return Ok(None);
                }
            }
        }
        if total > self.settings.max_file_size {
            return Err(DownloadError::TooLarge {
                estimated: total,
                limit: self.settings.max_file_size,
            });
        }
        Ok(Some(total))
    }

    fn scratch_path(&self, ext: &str) -> TempFile {
        TempFile::new(
            self.settings
                .download_dir
                .join(format!("{}.{}", uuid::Uuid::new_v4(), ext)),
        )
    }

    async fn download_to(
        &self,
        source: &MediaSource,
        encoding: &RawEncoding,
        path: &Path,
        expected: Option<u64>,
    ) -> Result<u64, DownloadError> {
        let mut stream = self.platform.open_stream(source, encoding).await?;
        let progress = TransferProgress::new(expected);
        let mut reader = ProgressReader::new(stream.reader(), progress.clone());

        let mut file = fs::File::create(path).await?;
        let copied = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| DownloadError::Stream(format!("itag {}: {}", encoding.tag, e)))?;
        file.flush().await?;
        drop(file);
        stream.finish().await?;

        if copied == 0 {
            return Err(DownloadError::Stream(format!("itag {}: empty stream", encoding.tag)));
        }
        log::info!(
            "📦 itag {}: {} bytes ({}%)",
            encoding.tag,
            progress.bytes(),
            progress.percent().map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
        );
        Ok(copied)
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
