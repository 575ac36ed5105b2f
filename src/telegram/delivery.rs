//! Uploading a downloaded file to the chat.

use std::path::{Path, PathBuf};

use fs_err::tokio as fs;

use crate::core::error::AppError;
use crate::download::error::DownloadError;
use crate::download::fetcher::DEFAULT_EXTENSION;
use crate::download::temp::TempFile;
use crate::telegram::messenger::{ChatRef, FileKind, MessageRef, Messenger};

/// A sent file. The guard deletes the local copy when this is dropped,
/// so callers record usage first.
#[derive(Debug)]
pub struct Delivered {
    pub file: TempFile,
    pub bytes: u64,
    pub message: MessageRef,
}

/// Send method for a file extension, `None` when there is none
pub fn file_kind(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "mp4" | "3gp" => Some(FileKind::Video),
        "weba" | "mp3" | "m4a" => Some(FileKind::Audio),
        _ => None,
    }
}

/// Looks for a file with the same stem but another extension, preferring
/// the fallback container, and renames it to `expected`.
async fn recover_sibling(expected: &Path) -> Result<bool, DownloadError> {
    let (Some(dir), Some(stem)) = (expected.parent(), expected.file_stem()) else {
        return Ok(false);
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };

    let mut siblings: Vec<PathBuf> = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(false),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_stem() == Some(stem) && path.file_name() != expected.file_name() {
            siblings.push(path);
        }
    }

    let fallback_ext = DEFAULT_EXTENSION.trim_start_matches('.');
    siblings.sort_by_key(|p| p.extension().and_then(|e| e.to_str()) != Some(fallback_ext));

    let Some(found) = siblings.into_iter().next() else {
        return Ok(false);
    };
    log::info!("🔁 Renaming {} to {}", found.display(), expected.display());
    fs::rename(&found, expected).await?;
    Ok(true)
}

/// Uploads `file` as video or audio, picked by extension.
///
/// The file is deleted on every failure path. On success the caller owns
/// the guard inside `Delivered`.
pub async fn deliver(
    messenger: &dyn Messenger,
    chat: ChatRef,
    reply_to: Option<MessageRef>,
    file: TempFile,
) -> Result<Delivered, AppError> {
    let path = file.path().to_path_buf();
    let kind = file_kind(&path).ok_or_else(|| {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        DownloadError::UnsupportedDeliveryFormat(ext)
    })?;

    if fs::metadata(&path).await.is_err() && !recover_sibling(&path).await? {
        return Err(DownloadError::FileNotFound(path.display().to_string()).into());
    }

    let bytes = fs::metadata(&path).await?.len();
    let caption = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    log::info!("📤 Sending {:?} {} ({} bytes) to chat {}", kind, path.display(), bytes, chat.0);
    let message = messenger.send_file(chat, reply_to, kind, &path, &caption).await?;

    Ok(Delivered { file, bytes, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_by_extension() {
        assert_eq!(file_kind(Path::new("a.mp4")), Some(FileKind::Video));
        assert_eq!(file_kind(Path::new("a.3GP")), Some(FileKind::Video));
        assert_eq!(file_kind(Path::new("a.m4a")), Some(FileKind::Audio));
        assert_eq!(file_kind(Path::new("a.weba")), Some(FileKind::Audio));
        assert_eq!(file_kind(Path::new("a.mp3")), Some(FileKind::Audio));
        assert_eq!(file_kind(Path::new("a.mov")), None);
        assert_eq!(file_kind(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn recovers_fallback_sibling() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip [18].mov"), b"x").unwrap();
        std::fs::write(dir.path().join("clip [18].flv"), b"y").unwrap();
        let expected = dir.path().join("clip [18].mp4");

        assert!(recover_sibling(&expected).await.unwrap());
        assert_eq!(std::fs::read(&expected).unwrap(), b"x");
        assert!(!dir.path().join("clip [18].mov").exists());
    }

    #[tokio::test]
    async fn no_sibling_means_no_recovery() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!recover_sibling(&dir.path().join("missing.mp4")).await.unwrap());
    }
}
