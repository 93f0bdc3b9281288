//! Generated HTML for the destination tree.
//!
//! Each completed rendition gets a small player page next to its playlist,
//! and the destination root carries an index of every completed title. Both
//! are plain string templates; the pages are static files served as-is.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::worker::PLAYLIST_NAME;

const TITLE_TEMPLATE: &str = include_str!("templates/title.html");
const INDEX_TEMPLATE: &str = include_str!("templates/index.html");

/// Thumbnail file an index entry links when present.
const THUMB_NAME: &str = "thumb.jpg";

/// Write the player page for one completed rendition.
pub async fn write_title_page(dest_dir: &Path, title: &str) -> Result<()> {
    let page = TITLE_TEMPLATE.replace("{title}", &escape(title));
    tokio::fs::write(dest_dir.join("index.html"), page).await?;
    Ok(())
}

/// Regenerate the destination root index from the completed renditions.
///
/// Walks one directory level; a title appears once its playlist marker
/// exists, with its thumbnail when one sits next to the playlist.
pub async fn rebuild_index(dst_dir: &Path) -> Result<()> {
    let mut titles = Vec::new();
    let mut dirs = tokio::fs::read_dir(dst_dir).await?;
    while let Some(entry) = dirs.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let dir = entry.path();
        if !tokio::fs::try_exists(dir.join(PLAYLIST_NAME))
            .await
            .unwrap_or(false)
        {
            debug!(dir = %dir.display(), "no playlist yet, skipping index entry");
            continue;
        }
        let title = entry.file_name().to_string_lossy().into_owned();
        let has_thumb = tokio::fs::try_exists(dir.join(THUMB_NAME))
            .await
            .unwrap_or(false);
        titles.push((title, has_thumb));
    }
    // Directory iteration order is arbitrary; the index is not.
    titles.sort();

    let mut entries = String::new();
    for (title, has_thumb) in &titles {
        let escaped = escape(title);
        if *has_thumb {
            entries.push_str(&format!(
                "    <li><a href=\"./{escaped}/\"><img src=\"./{escaped}/{THUMB_NAME}\" alt=\"\"><span>{escaped}</span></a></li>\n"
            ));
        } else {
            entries.push_str(&format!(
                "    <li><a href=\"./{escaped}/\"><span>{escaped}</span></a></li>\n"
            ));
        }
    }

    let page = INDEX_TEMPLATE.replace("{entries}", &entries);
    tokio::fs::write(dst_dir.join("index.html"), page).await?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
