//! Redraws a finished card from its image and headline.

use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;

use crate::error::ExportError;

/// Headlines are cut to this many lines.
pub const MAX_HEADLINE_LINES: usize = 2;

/// Share of the card height covered by the bottom scrim.
const SCRIM_HEIGHT: f32 = 0.45;
/// Darkening at the very bottom edge.
const SCRIM_MAX_ALPHA: f32 = 0.75;

/// Load a TrueType/OpenType font from disk.
///
/// # Errors
///
/// Returns [`ExportError::Font`] if the file cannot be read or parsed.
pub fn load_font(path: &Path) -> Result<FontArc, ExportError> {
    let data = std::fs::read(path)
        .map_err(|e| ExportError::Font(format!("cannot read {}: {e}", path.display())))?;
    FontArc::try_from_vec(data)
        .map_err(|e| ExportError::Font(format!("cannot parse {}: {e}", path.display())))
}

fn text_width(font: &FontArc, scale: PxScale, text: &str) -> f32 {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut prev = None;
    for c in text.chars() {
        let glyph_id = scaled.glyph_id(c);
        if let Some(prev_id) = prev {
            width += scaled.kern(prev_id, glyph_id);
        }
        width += scaled.h_advance(glyph_id);
        prev = Some(glyph_id);
    }
    width
}

/// Break one word that is wider than `max_width` on character boundaries.
fn split_long_word(word: &str, max_width: f32, measure: &impl Fn(&str) -> f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if measure(&current) > max_width && current.chars().count() > 1 {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Word-wrap `text` to `max_width`, honoring explicit line breaks, and keep at
/// most `max_lines` lines. A cut headline ends with `…`.
pub fn wrap_lines(
    text: &str,
    max_width: f32,
    max_lines: usize,
    measure: impl Fn(&str) -> f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate =
                if current.is_empty() { word.to_string() } else { format!("{current} {word}") };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = split_long_word(word, max_width, &measure);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            while !last.is_empty() && measure(&format!("{last}…")) > max_width {
                last.pop();
            }
            last.push('…');
        }
    }
    lines
}

/// Darken the bottom of the card with a vertical gradient.
pub fn apply_scrim(canvas: &mut RgbaImage) {
    let (width, height) = canvas.dimensions();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let start = (height as f32 * (1.0 - SCRIM_HEIGHT)) as u32;
    let span = height.saturating_sub(start).max(1);
    for y in start..height {
        #[allow(clippy::cast_precision_loss)]
        let alpha = SCRIM_MAX_ALPHA * (y - start + 1) as f32 / span as f32;
        for x in 0..width {
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in 0..3 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let darkened = (f32::from(pixel[channel]) * (1.0 - alpha)) as u8;
                pixel[channel] = darkened;
            }
            pixel[3] = 255;
        }
    }
}

/// Draw the card: image, bottom scrim, and the headline centered above the
/// bottom edge. Without a font only the scrim is drawn.
///
/// # Errors
///
/// Returns [`ExportError::Decode`] if the image bytes are not a supported image.
pub fn render_card(
    image_bytes: &[u8],
    headline: &str,
    font: Option<&FontArc>,
) -> Result<RgbaImage, ExportError> {
    let img = image::load_from_memory(image_bytes).map_err(|e| ExportError::Decode(e.to_string()))?;
    let mut canvas = img.to_rgba8();
    apply_scrim(&mut canvas);

    let Some(font) = font else {
        tracing::warn!("no font configured; exporting card without headline");
        return Ok(canvas);
    };

    #[allow(clippy::cast_precision_loss)]
    let (width, height) = (canvas.width() as f32, canvas.height() as f32);
    let font_size = (width * 0.065).max(24.0);
    let scale = PxScale::from(font_size);
    let padding = width * 0.08;
    let lines = wrap_lines(headline, width - 2.0 * padding, MAX_HEADLINE_LINES, |line| {
        text_width(font, scale, line)
    });

    let line_height = font_size * 1.3;
    #[allow(clippy::cast_precision_loss)]
    let mut y = height - padding - line_height * lines.len() as f32;
    let shadow = Rgba([0u8, 0, 0, 200]);
    let white = Rgba([255u8, 255, 255, 255]);
    let offset = (font_size / 16.0).max(1.0);
    for line in &lines {
        let x = (width - text_width(font, scale, line)) / 2.0;
        #[allow(clippy::cast_possible_truncation)]
        let (px, py, off) = (x as i32, y as i32, offset as i32);
        draw_text_mut(&mut canvas, shadow, px + off, py + off, scale, font, line);
        draw_text_mut(&mut canvas, white, px, py, scale, font, line);
        y += line_height;
    }
    Ok(canvas)
}

/// Encode a rendered card as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if encoding fails.
pub fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn chars(text: &str) -> f32 {
        text.chars().count() as f32
    }

    fn solid_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 200, 200, 255]));
        encode_png(img).unwrap()
    }

    #[test]
    fn short_headline_is_one_line() {
        assert_eq!(wrap_lines("Drink more water", 20.0, 2, chars), ["Drink more water"]);
    }

    #[test]
    fn wraps_on_words() {
        assert_eq!(wrap_lines("one two three four", 9.0, 3, chars), ["one two", "three", "four"]);
    }

    #[test]
    fn explicit_breaks_are_kept() {
        assert_eq!(wrap_lines("First line\nSecond", 40.0, 2, chars), ["First line", "Second"]);
    }

    #[test]
    fn at_most_two_lines_with_ellipsis() {
        let lines = wrap_lines("aaa bbb ccc ddd", 3.0, 2, chars);
        assert_eq!(lines, ["aaa", "bb…"]);
    }

    #[test]
    fn long_words_break_on_characters() {
        let lines = wrap_lines("면역력의핵심체온", 4.0, 2, chars);
        assert_eq!(lines, ["면역력의", "핵심체온"]);
    }

    #[test]
    fn scrim_darkens_only_the_bottom() {
        let mut canvas = RgbaImage::from_pixel(10, 100, Rgba([200, 200, 200, 255]));
        apply_scrim(&mut canvas);
        assert_eq!(canvas.get_pixel(5, 10)[0], 200);
        let bottom = canvas.get_pixel(5, 99)[0];
        let middle = canvas.get_pixel(5, 80)[0];
        assert!(bottom < middle, "{bottom} should be darker than {middle}");
        assert!(middle < 200);
    }

    #[test]
    fn render_keeps_dimensions_without_font() {
        let canvas = render_card(&solid_png(64, 96), "Headline", None).unwrap();
        assert_eq!(canvas.dimensions(), (64, 96));
    }

    #[test]
    fn render_rejects_non_images() {
        assert!(matches!(render_card(b"not an image", "h", None), Err(ExportError::Decode(_))));
    }

    #[test]
    fn missing_font_file_is_a_font_error() {
        assert!(matches!(
            load_font(Path::new("/nonexistent/font.ttf")),
            Err(ExportError::Font(_))
        ));
    }
}
