//! Format catalog: the list of renditions offered to the user.

use std::collections::HashSet;

use crate::core::utils::bytes_to_mb;
use crate::download::estimate::estimate_size;
use crate::download::platform::{mime_essence, MediaKind, MediaSource, RawEncoding};
use crate::telegram::selection::SelectionToken;

/// Containers we cannot deliver as a playable Telegram video or audio
pub const DENIED_MIME_TYPES: [&str; 2] = ["audio/webm", "video/webm"];

pub fn is_denied(mime: &str) -> bool {
    DENIED_MIME_TYPES.contains(&mime_essence(mime))
}

/// Presentable view of one rendition
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub tag: u32,
    pub kind: MediaKind,
    /// MIME type without parameters, e.g. `video/mp4`
    pub mime_essence: String,
    pub quality_label: String,
    pub has_audio: bool,
    /// Declared or estimated size; for video-only renditions this
    /// includes the audio track that will be muxed in
    pub size_bytes: Option<u64>,
}

impl Encoding {
    /// Video renditions without sound need the composite fetch path
    pub fn needs_mux(&self) -> bool {
        self.kind == MediaKind::Video && !self.has_audio
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub encoding: Encoding,
    pub label: String,
    pub size_mb: Option<f64>,
    pub token: SelectionToken,
}

/// Builds the deduplicated, filtered and labelled rendition list.
///
/// Provider order is preserved and the first occurrence of a tag wins.
/// Renditions whose size cannot be estimated stay in the list with an
/// unknown size.
pub fn build_catalog(source: &MediaSource) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    let audio_track_size = best_audio(source).and_then(|audio| match estimate_size(audio) {
        Ok(size) => Some(size),
        Err(e) => {
            log::warn!("Audio track size unknown for {}: {}", source.url, e);
            None
        }
    });

    let mut entries = Vec::new();
    for raw in &source.encodings {
        if !seen.insert(raw.tag) || is_denied(&raw.mime_type) {
            continue;
        }
        let Some(kind) = raw.kind() else {
            continue;
        };

        let own_size = match estimate_size(raw) {
            Ok(size) => Some(size),
            Err(e) => {
                log::warn!("Size unknown for {}: {}", source.url, e);
                None
            }
        };

        let has_audio = raw.has_audio();
        let size_bytes = match (kind, has_audio) {
            (MediaKind::Video, false) => own_size.map(|video| video + audio_track_size.unwrap_or(0)),
            _ => own_size,
        };

        let encoding = Encoding {
            tag: raw.tag,
            kind,
            mime_essence: mime_essence(&raw.mime_type).to_string(),
            quality_label: raw.quality_label.clone(),
            has_audio,
            size_bytes,
        };
        let size_mb = size_bytes.map(bytes_to_mb);

        entries.push(CatalogEntry {
            label: label(&encoding, size_mb),
            size_mb,
            token: SelectionToken::format(&source.url, raw.tag),
            encoding,
        });
    }

    entries
}

/// `video/mp4, 720p, 12.34 Mb`; the quality part is dropped when empty
pub fn label(encoding: &Encoding, size_mb: Option<f64>) -> String {
    let mut label = encoding.mime_essence.clone();
    if !encoding.quality_label.is_empty() {
        label.push_str(", ");
        label.push_str(&encoding.quality_label);
    }
    match size_mb {
        Some(mb) => label.push_str(&format!(", {:.2} Mb", mb)),
        None => label.push_str(", ? Mb"),
    }
    label
}

/// Highest bitrate wins, earlier entries win ties
fn pick_best<'a>(candidates: impl Iterator<Item = &'a RawEncoding>) -> Option<&'a RawEncoding> {
    candidates.fold(None, |best, e| match best {
        Some(b) if b.effective_bitrate() >= e.effective_bitrate() => Some(b),
        _ => Some(e),
    })
}

/// Audio track for muxing and for audio-only batch downloads.
///
/// Prefers `audio/mp4`, then any deliverable audio rendition.
pub fn best_audio(source: &MediaSource) -> Option<&RawEncoding> {
    let audio = move || {
        source
            .encodings
            .iter()
            .filter(|e| e.kind() == Some(MediaKind::Audio) && !is_denied(&e.mime_type))
    };
    pick_best(audio().filter(|e| mime_essence(&e.mime_type) == "audio/mp4")).or_else(|| pick_best(audio()))
}

/// Silent `video/mp4` rendition matching `quality_hint` (any quality when empty)
pub fn best_video_track<'a>(source: &'a MediaSource, quality_hint: &str) -> Option<&'a RawEncoding> {
    pick_best(source.encodings.iter().filter(|e| {
        mime_essence(&e.mime_type) == "video/mp4"
            && !e.has_audio()
            && (quality_hint.is_empty() || e.quality_label == quality_hint)
    }))
}

/// Video rendition that already carries sound
pub fn best_muxed_video(source: &MediaSource) -> Option<&RawEncoding> {
    pick_best(
        source
            .encodings
            .iter()
            .filter(|e| e.kind() == Some(MediaKind::Video) && e.has_audio() && !is_denied(&e.mime_type)),
    )
}
