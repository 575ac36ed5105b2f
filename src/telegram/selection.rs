//! Callback data tokens attached to inline keyboard buttons.
//!
//! A token is `<first>,<second>`: either a video URL and an itag, or the
//! playlist marker and a batch keyword / playlist entry ID. Tokens are built
//! when a prompt is sent and decoded once when the user presses a button.

use std::fmt;

use thiserror::Error;

use crate::core::config::limits::CALLBACK_DATA_MAX_BYTES;
use crate::download::platform::MediaKind;

/// First segment of every playlist button
pub const PLAYLIST_MARKER: &str = "pl";
pub const ALL_VIDEO: &str = "allVideo";
pub const ALL_AUDIO: &str = "allAudio";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("malformed selection: {0:?}")]
    Malformed(String),
    #[error("selection is {len} bytes, transport allows {max}")]
    TooLong { len: usize, max: usize },
}

/// Encoded callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionToken(String);

impl SelectionToken {
    pub fn encode(first: &str, second: &str) -> Self {
        Self(format!("{},{}", first, second))
    }

    pub fn format(url: &str, tag: u32) -> Self {
        Self::encode(url, &tag.to_string())
    }

    pub fn playlist_all(kind: MediaKind) -> Self {
        let keyword = match kind {
            MediaKind::Video => ALL_VIDEO,
            MediaKind::Audio => ALL_AUDIO,
        };
        Self::encode(PLAYLIST_MARKER, keyword)
    }

    pub fn playlist_entry(entry_id: &str) -> Self {
        Self::encode(PLAYLIST_MARKER, entry_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fits_transport(&self) -> bool {
        self.0.len() <= CALLBACK_DATA_MAX_BYTES
    }

    /// Errors when the token does not fit into Telegram callback data
    pub fn checked(self) -> Result<Self, SelectionError> {
        if self.fits_transport() {
            Ok(self)
        } else {
            Err(SelectionError::TooLong {
                len: self.0.len(),
                max: CALLBACK_DATA_MAX_BYTES,
            })
        }
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Splits callback data on the first comma.
pub fn decode(data: &str) -> Result<(&str, &str), SelectionError> {
    match data.split_once(',') {
        Some((first, second)) if !first.is_empty() && !second.is_empty() => Ok((first, second)),
        _ => Err(SelectionError::Malformed(data.to_string())),
    }
}

/// What the pressed button asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One rendition of one video
    Format { url: String, tag: u32 },
    /// Every playlist entry as video or audio
    PlaylistAll(MediaKind),
    /// Show the format prompt for one playlist entry
    PlaylistEntry(String),
}

impl Selection {
    pub fn parse(data: &str) -> Result<Self, SelectionError> {
        let (first, second) = decode(data)?;

        if first == PLAYLIST_MARKER {
            return Ok(match second {
                ALL_VIDEO => Selection::PlaylistAll(MediaKind::Video),
                ALL_AUDIO => Selection::PlaylistAll(MediaKind::Audio),
                id => Selection::PlaylistEntry(id.to_string()),
            });
        }

        let tag = second
            .trim()
            .parse::<u32>()
            .map_err(|_| SelectionError::Malformed(data.to_string()))?;
        Ok(Selection::Format {
            url: first.to_string(),
            tag,
        })
    }
}
