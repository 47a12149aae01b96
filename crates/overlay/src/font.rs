//! Runtime font replacement.
//!
//! Requests are queued from any thread and applied on the render thread
//! between frames, one per loop iteration.

use std::{
    collections::VecDeque,
    fmt::{self, Debug},
    fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    sync::Arc,
};

use ab_glyph::{Font, FontRef};
use anyhow::{Context, bail};
use egui::{FontData, FontDefinitions, FontFamily};
use parking_lot::Mutex;
use tracing::{debug, warn};

const LATIN: RangeInclusive<u32> = 0x0020..=0x00FF;
const CJK_PUNCTUATION_KANA: RangeInclusive<u32> = 0x3000..=0x30FF;
const KATAKANA_EXT: RangeInclusive<u32> = 0x31F0..=0x31FF;
const HALF_FULL_WIDTH: RangeInclusive<u32> = 0xFF00..=0xFFEF;
const REPLACEMENT: RangeInclusive<u32> = 0xFFFD..=0xFFFD;

/// Set of characters a replacement font is expected to cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlyphRanges {
    English,
    ChineseSimplifiedCommon,
    ChineseFull,
    Japanese,
    Korean,
    Thai,
    Vietnamese,
    Cyrillic,

    /// Explicit inclusive codepoint ranges.
    Custom(Vec<RangeInclusive<u32>>),
}

impl GlyphRanges {
    /// Codepoint ranges of the set.
    pub fn ranges(&self) -> Vec<RangeInclusive<u32>> {
        match self {
            GlyphRanges::English => vec![LATIN],
            GlyphRanges::ChineseSimplifiedCommon => vec![
                LATIN,
                0x2000..=0x206F,
                CJK_PUNCTUATION_KANA,
                KATAKANA_EXT,
                HALF_FULL_WIDTH,
                REPLACEMENT,
                0x4E00..=0x9FA5,
            ],
            GlyphRanges::ChineseFull => vec![
                LATIN,
                0x2000..=0x206F,
                CJK_PUNCTUATION_KANA,
                KATAKANA_EXT,
                HALF_FULL_WIDTH,
                REPLACEMENT,
                0x4E00..=0x9FAF,
            ],
            GlyphRanges::Japanese => vec![
                LATIN,
                CJK_PUNCTUATION_KANA,
                KATAKANA_EXT,
                HALF_FULL_WIDTH,
                REPLACEMENT,
                0x4E00..=0x9FAF,
            ],
            GlyphRanges::Korean => vec![LATIN, 0x3131..=0x3163, 0xAC00..=0xD7A3, REPLACEMENT],
            GlyphRanges::Thai => vec![LATIN, 0x2010..=0x205E, 0x0E00..=0x0E7F],
            GlyphRanges::Vietnamese => vec![
                LATIN,
                0x0102..=0x0103,
                0x0110..=0x0111,
                0x0128..=0x0129,
                0x0168..=0x0169,
                0x01A0..=0x01A1,
                0x01AF..=0x01B0,
                0x1EA0..=0x1EF9,
            ],
            GlyphRanges::Cyrillic => vec![
                LATIN,
                0x0400..=0x052F,
                0x2DE0..=0x2DFF,
                0xA640..=0xA69F,
            ],
            GlyphRanges::Custom(ranges) => ranges.clone(),
        }
    }

    /// Check explicit ranges are non-empty, ordered and inside the unicode range.
    pub fn validate(&self) -> anyhow::Result<()> {
        let GlyphRanges::Custom(ranges) = self else {
            return Ok(());
        };

        if ranges.is_empty() {
            bail!("glyph range list is empty");
        }

        for range in ranges {
            if range.start() > range.end() {
                bail!(
                    "glyph range {:#x}..={:#x} is reversed",
                    range.start(),
                    range.end()
                );
            }

            if *range.start() == 0 || *range.end() > char::MAX as u32 {
                bail!(
                    "glyph range {:#x}..={:#x} is outside of unicode",
                    range.start(),
                    range.end()
                );
            }
        }

        Ok(())
    }
}

/// Custom font loader.
///
/// Runs on the render thread after the file is registered as [`FONT_NAME`], the loader
/// places it in font families.
pub type FontLoader = Box<dyn FnOnce(&mut FontDefinitions) -> anyhow::Result<()> + Send>;

pub enum FontGlyphs {
    Ranges(GlyphRanges),
    Loader(FontLoader),
}

impl Debug for FontGlyphs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ranges(ranges) => f.debug_tuple("Ranges").field(ranges).finish(),
            Self::Loader(_) => f.write_str("Loader(..)"),
        }
    }
}

#[derive(Debug)]
pub struct FontRequest {
    pub path: PathBuf,
    pub size: f32,
    pub glyphs: FontGlyphs,
}

impl FontRequest {
    /// Create a request after checking the file exists and the ranges are valid.
    pub fn new(path: impl AsRef<Path>, size: f32, glyphs: FontGlyphs) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("font file {} does not exist", path.display());
        }

        if !(size.is_finite() && size > 0.0) {
            bail!("invalid font size {}", size);
        }

        if let FontGlyphs::Ranges(ref ranges) = glyphs {
            ranges.validate()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            size,
            glyphs,
        })
    }
}

/// Pending font requests, drained in FIFO order.
#[derive(Default)]
pub struct FontQueue {
    queue: Mutex<VecDeque<FontRequest>>,
}

impl FontQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: FontRequest) {
        debug!("font request queued: {}", request.path.display());
        self.queue.lock().push_back(request);
    }

    pub fn pop(&self) -> Option<FontRequest> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Name the requested font file is registered under in [`FontDefinitions::font_data`].
pub const FONT_NAME: &str = "glasspane-replacement";

/// Load a requested font and make it the primary font of the context.
///
/// Failures keep the current font.
#[tracing::instrument(skip(ctx))]
pub fn apply(ctx: &egui::Context, request: FontRequest) -> anyhow::Result<()> {
    let FontRequest { path, size, glyphs } = request;

    let bytes =
        fs::read(&path).with_context(|| format!("cannot read font {}", path.display()))?;
    let covered = {
        let font = FontRef::try_from_slice(&bytes)
            .with_context(|| format!("invalid font file {}", path.display()))?;

        match glyphs {
            FontGlyphs::Ranges(ref ranges) => Some(coverage(&font, ranges)),
            FontGlyphs::Loader(_) => None,
        }
    };

    let mut definitions = FontDefinitions::default();
    definitions
        .font_data
        .insert(FONT_NAME.to_owned(), Arc::new(FontData::from_owned(bytes)));

    match glyphs {
        FontGlyphs::Ranges(ranges) => {
            let (covered, total) = covered.unwrap_or_default();
            if covered == 0 {
                bail!(
                    "font {} has no glyph in requested ranges {:?}",
                    path.display(),
                    ranges
                );
            }
            debug!("font covers {}/{} requested glyphs", covered, total);

            for family in [FontFamily::Proportional, FontFamily::Monospace] {
                definitions
                    .families
                    .entry(family)
                    .or_default()
                    .insert(0, FONT_NAME.to_owned());
            }
        }

        FontGlyphs::Loader(loader) => {
            loader(&mut definitions).context("custom font loader failed")?;
        }
    }

    ctx.set_fonts(definitions);
    set_text_size(ctx, size);
    Ok(())
}

/// Apply at most one queued request.
///
/// Returns `true` if a request was taken from the queue.
pub fn drain_one(ctx: &egui::Context, queue: &FontQueue) -> bool {
    let Some(request) = queue.pop() else {
        return false;
    };

    if let Err(err) = apply(ctx, request) {
        warn!("font replacement failed. err: {:?}", err);
    }
    true
}

fn set_text_size(ctx: &egui::Context, size: f32) {
    ctx.style_mut(|style| {
        let Some(body) = style
            .text_styles
            .get(&egui::TextStyle::Body)
            .map(|font| font.size)
        else {
            return;
        };
        let scale = size / body;

        for font in style.text_styles.values_mut() {
            font.size *= scale;
        }
    });
}

fn coverage(font: &impl Font, ranges: &GlyphRanges) -> (usize, usize) {
    let mut covered = 0;
    let mut total = 0;
    for range in ranges.ranges() {
        for ch in range.filter_map(char::from_u32) {
            total += 1;
            if font.glyph_id(ch).0 != 0 {
                covered += 1;
            }
        }
    }

    (covered, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn missing_file_is_rejected() {
        let res = FontRequest::new(
            "/this/font/does/not/exist.ttf",
            16.0,
            FontGlyphs::Ranges(GlyphRanges::English),
        );
        assert!(res.is_err());
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        let file = font_file();

        for ranges in [
            vec![],
            vec![0x30..=0x20],
            vec![0x0..=0x20],
            vec![0x20..=0x11_0000],
        ] {
            let res = FontRequest::new(
                file.path(),
                16.0,
                FontGlyphs::Ranges(GlyphRanges::Custom(ranges)),
            );
            assert!(res.is_err());
        }

        assert!(
            FontRequest::new(
                file.path(),
                16.0,
                FontGlyphs::Ranges(GlyphRanges::Custom(vec![0x20..=0xFFFF])),
            )
            .is_ok()
        );
    }

    #[test]
    fn queue_is_fifo() {
        let file = font_file();
        let queue = FontQueue::new();
        for size in [13.0, 20.0, 30.0] {
            queue.push(
                FontRequest::new(file.path(), size, FontGlyphs::Ranges(GlyphRanges::Korean))
                    .unwrap(),
            );
        }

        let sizes: Vec<f32> = std::iter::from_fn(|| queue.pop())
            .map(|request| request.size)
            .collect();
        assert_eq!(sizes, [13.0, 20.0, 30.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn invalid_font_keeps_queue_moving() {
        let file = font_file();
        std::fs::write(file.path(), b"not a font").unwrap();

        let ctx = egui::Context::default();
        let queue = FontQueue::new();
        queue.push(
            FontRequest::new(file.path(), 16.0, FontGlyphs::Ranges(GlyphRanges::English)).unwrap(),
        );

        assert!(drain_one(&ctx, &queue));
        assert!(!drain_one(&ctx, &queue));
    }

    #[test]
    fn presets_include_latin() {
        for preset in [
            GlyphRanges::English,
            GlyphRanges::ChineseSimplifiedCommon,
            GlyphRanges::ChineseFull,
            GlyphRanges::Japanese,
            GlyphRanges::Korean,
            GlyphRanges::Thai,
            GlyphRanges::Vietnamese,
            GlyphRanges::Cyrillic,
        ] {
            assert!(preset.validate().is_ok());
            assert_eq!(preset.ranges()[0], LATIN);
        }
    }
}
