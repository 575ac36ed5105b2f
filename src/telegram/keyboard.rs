//! Selection prompts: prompt text and inline keyboards.
//!
//! The prompt text carries the link on its own line. Playlist buttons only
//! carry the `pl` marker, so the playlist URL is read back from the prompt
//! when a button is pressed.

use unic_langid::LanguageIdentifier;

use crate::download::catalog::CatalogEntry;
use crate::download::platform::{MediaKind, Playlist};
use crate::i18n;
use crate::telegram::messenger::KeyboardButton;
use crate::telegram::selection::{SelectionError, SelectionToken};

pub type KeyboardRows = Vec<Vec<KeyboardButton>>;

/// `your link` / URL / `choose ...`
pub fn prompt_text(lang: &LanguageIdentifier, url: &str, playlist: bool) -> String {
    let choose = if playlist { "choose-playlist" } else { "choose-format" };
    format!(
        "{}\n{}\n{}",
        i18n::t(lang, "your-link"),
        url,
        i18n::t(lang, choose)
    )
}

/// First line of a prompt that holds a link
pub fn extract_link_line(prompt: &str) -> Option<&str> {
    prompt
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("https://") || line.starts_with("http://"))
}

/// One button per rendition, in catalog order
pub fn format_keyboard(catalog: &[CatalogEntry]) -> Result<KeyboardRows, SelectionError> {
    catalog
        .iter()
        .map(|entry| {
            let token = entry.token.clone().checked()?;
            Ok(vec![KeyboardButton::new(entry.label.clone(), token.into_string())])
        })
        .collect()
}

/// Batch buttons on top, then one button per playlist entry
pub fn playlist_keyboard(lang: &LanguageIdentifier, playlist: &Playlist) -> Result<KeyboardRows, SelectionError> {
    let mut rows = vec![vec![
        KeyboardButton::new(
            i18n::t(lang, "download-all-video"),
            SelectionToken::playlist_all(MediaKind::Video).checked()?.into_string(),
        ),
        KeyboardButton::new(
            i18n::t(lang, "download-all-audio"),
            SelectionToken::playlist_all(MediaKind::Audio).checked()?.into_string(),
        ),
    ]];

    for entry in &playlist.entries {
        let token = SelectionToken::playlist_entry(&entry.id).checked()?;
        rows.push(vec![KeyboardButton::new(entry.title.clone(), token.into_string())]);
    }
    Ok(rows)
}
