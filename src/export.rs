//! PNG and ZIP export of finished cards.

use std::io::Write;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use futures_util::future::join_all;
use reqwest::Client;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::data_url;
use crate::error::ExportError;
use crate::pipeline::Card;
use crate::render::{encode_png, render_card};

const MAX_FILE_NAME_CHARS: usize = 50;
const FALLBACK_FILE_NAME: &str = "cardnews";

fn is_reserved(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

/// Make a topic safe to use as a file name. Applying it twice changes nothing.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| if is_reserved(c) { '_' } else { c })
        .take(MAX_FILE_NAME_CHARS)
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{topic}_card{n}.png`
#[must_use]
pub fn card_file_name(topic: &str, index: usize) -> String {
    format!("{}_card{index}.png", sanitize_file_name(topic))
}

/// `{topic}_cards.zip`
#[must_use]
pub fn archive_file_name(topic: &str) -> String {
    format!("{}_cards.zip", sanitize_file_name(topic))
}

/// Result of a batch export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Path of the written archive.
    pub path: PathBuf,
    /// Cards included in the archive.
    pub succeeded: usize,
    /// Cards skipped because they could not be rendered.
    pub failed: usize,
}

/// Build an in-memory ZIP from `(entry name, bytes)` pairs.
///
/// # Errors
///
/// Returns an error if an entry cannot be written.
pub fn build_zip(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, ExportError> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Renders cards to PNG and writes them to disk.
#[derive(Clone)]
pub struct Exporter {
    client: Client,
    font: Option<FontArc>,
}

impl Exporter {
    /// An exporter that draws headlines with `font`, or skips them when `None`.
    #[must_use]
    pub fn new(font: Option<FontArc>) -> Self {
        Self { client: Client::new(), font }
    }

    /// Card image bytes: decoded in place for data URLs, downloaded otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Fetch`] if the URL cannot be decoded or downloaded.
    pub async fn resolve_image(&self, url: &str) -> Result<Vec<u8>, ExportError> {
        if data_url::is_data_url(url) {
            return data_url::decode(url).map(|(_, bytes)| bytes).map_err(ExportError::Fetch);
        }
        tracing::debug!(url, "downloading card image");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExportError::Fetch(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| ExportError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Resolve, redraw and encode one card.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub async fn render_png(&self, card: &Card) -> Result<Vec<u8>, ExportError> {
        let bytes = self.resolve_image(&card.image_url).await?;
        let canvas = render_card(&bytes, &card.headline, self.font.as_ref())?;
        encode_png(canvas)
    }

    /// Write one card as `{topic}_card{index}.png` in `dir`. Any failure is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if the card cannot be rendered or written.
    pub async fn export_one(
        &self,
        card: &Card,
        index: usize,
        topic: &str,
        dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        let png = self.render_png(card).await?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(card_file_name(topic, index));
        std::fs::write(&path, png)?;
        tracing::info!(path = %path.display(), "card exported");
        Ok(path)
    }

    /// Render every card concurrently and write the successes into
    /// `{topic}_cards.zip` as `card{n}.png`. Failed cards are logged and
    /// counted.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::NothingExported`] when no card could be
    /// rendered, or an error if the archive cannot be written.
    pub async fn export_all(
        &self,
        cards: &[Card],
        topic: &str,
        dir: &Path,
    ) -> Result<ExportReport, ExportError> {
        let rendered = join_all(cards.iter().map(|card| self.render_png(card))).await;

        let mut entries = Vec::new();
        let mut failed = 0;
        for (index, result) in rendered.into_iter().enumerate() {
            match result {
                Ok(png) => entries.push((format!("card{}.png", index + 1), png)),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(card = index + 1, error = %err, "skipping card in archive");
                }
            }
        }
        if entries.is_empty() {
            return Err(ExportError::NothingExported { failed });
        }

        let archive = build_zip(&entries)?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(archive_file_name(topic));
        std::fs::write(&path, archive)?;
        tracing::info!(path = %path.display(), succeeded = entries.len(), failed, "archive exported");
        Ok(ExportReport { path, succeeded: entries.len(), failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_data_url() -> String {
        let img = RgbaImage::from_pixel(8, 8, Rgba([10, 120, 200, 255]));
        data_url::from_bytes("image/png", &encode_png(img).unwrap())
    }

    fn card(id: u32, image_url: &str) -> Card {
        Card {
            id,
            headline: format!("Card {id}"),
            script: String::new(),
            image_prompt: String::new(),
            image_url: image_url.to_string(),
            used_fallback: false,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_file_name("  a/b:c*d?  "), "a_b_c_d_");
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
        assert_eq!(sanitize_file_name("   "), "cardnews");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "가".repeat(80);
        assert_eq!(sanitize_file_name(&long).chars().count(), 50);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let spaced = "x ".repeat(40);
        for name in ["  Winter: tips / tricks  ", "", "???", spaced.as_str(), "건강한 겨울나기 <팁>"] {
            let once = sanitize_file_name(name);
            assert_eq!(sanitize_file_name(&once), once, "{name:?}");
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(card_file_name("Tea time", 3), "Tea time_card3.png");
        assert_eq!(archive_file_name("a/b"), "a_b_cards.zip");
    }

    #[tokio::test]
    async fn export_one_writes_png() {
        let dir = temp_dir("cardnews_export_one_test");
        let exporter = Exporter::new(None);
        let path = exporter.export_one(&card(1, &png_data_url()), 1, "Tea", &dir).await.unwrap();

        assert_eq!(path, dir.join("Tea_card1.png"));
        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (8, 8));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn export_one_fails_on_broken_image() {
        let dir = temp_dir("cardnews_export_one_broken_test");
        let exporter = Exporter::new(None);
        let err = exporter
            .export_one(&card(1, "data:image/png;base64,bm90IGFuIGltYWdl"), 1, "Tea", &dir)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Decode(_)));
        assert!(!dir.join("Tea_card1.png").exists());
    }

    #[tokio::test]
    async fn export_all_skips_broken_cards() {
        let dir = temp_dir("cardnews_export_all_test");
        let good = png_data_url();
        let cards = vec![
            card(1, &good),
            card(2, "data:image/png;base64,bm90IGFuIGltYWdl"),
            card(3, &good),
            card(4, "data:image/png,not-base64"),
            card(5, &good),
        ];

        let report = Exporter::new(None).export_all(&cards, "Tea", &dir).await.unwrap();
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.path, dir.join("Tea_cards.zip"));

        let file = std::fs::File::open(&report.path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(names, ["card1.png", "card3.png", "card5.png"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn export_all_with_no_success_errors() {
        let dir = temp_dir("cardnews_export_none_test");
        let cards = vec![card(1, "data:image/png;base64,AAAA")];
        let err = Exporter::new(None).export_all(&cards, "Tea", &dir).await.unwrap_err();
        assert!(matches!(err, ExportError::NothingExported { failed: 1 }));
        assert!(!dir.join("Tea_cards.zip").exists());
    }
}
