//! Text rasterizers used for diagram axis labels.
//!
//! A font turns a label into a coverage mask (`[row, column]`, 0..=255 ink
//! intensity). Fonts are shared read-only across sweep workers, so every call
//! must be self-contained.

use ndarray::Array2;

use crate::error::Result;

pub trait LabelFont: Send + Sync {
    /// Nominal pixel size the font was configured with.
    fn size(&self) -> u32;

    /// Rendered `(width, height)` of `text` in pixels.
    fn measure(&self, text: &str) -> Result<(usize, usize)>;

    fn rasterize(&self, text: &str) -> Result<Array2<u8>>;
}

const GLYPH_WIDTH: usize = 3;
const GLYPH_HEIGHT: usize = 5;
const GLYPH_ADVANCE: usize = GLYPH_WIDTH + 1;
/// Font size covered by one glyph cell row, including leading.
const UNITS_PER_SCALE: u32 = 7;

/// Asset-free block font built from 3x5 glyph cells scaled to the requested
/// pixel size. Characters outside the glyph table render as a hollow box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockFont {
    size: u32,
}

impl BlockFont {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    fn scale(&self) -> usize {
        (self.size / UNITS_PER_SCALE).max(1) as usize
    }
}

impl Default for BlockFont {
    fn default() -> Self {
        Self::new(28)
    }
}

impl LabelFont for BlockFont {
    fn size(&self) -> u32 {
        self.size
    }

    fn measure(&self, text: &str) -> Result<(usize, usize)> {
        let scale = self.scale();
        let chars = text.chars().count();
        let width = (chars * GLYPH_ADVANCE).saturating_sub(1) * scale;
        Ok((width, GLYPH_HEIGHT * scale))
    }

    fn rasterize(&self, text: &str) -> Result<Array2<u8>> {
        let scale = self.scale();
        let (width, height) = self.measure(text)?;
        let mut mask = Array2::<u8>::zeros((height, width));
        for (idx, ch) in text.chars().enumerate() {
            let origin = idx * GLYPH_ADVANCE * scale;
            let glyph = glyph_bits(ch);
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let x0 = origin + col * scale;
                    let y0 = row * scale;
                    mask.slice_mut(ndarray::s![y0..y0 + scale, x0..x0 + scale])
                        .fill(255);
                }
            }
        }
        Ok(mask)
    }
}

const fn glyph_bits(ch: char) -> [u8; 5] {
    match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'Q' => [0b111, 0b101, 0b101, 0b111, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        'a' => [0b000, 0b110, 0b011, 0b101, 0b011],
        'b' => [0b100, 0b100, 0b110, 0b101, 0b110],
        'c' => [0b000, 0b011, 0b100, 0b100, 0b011],
        'd' => [0b001, 0b001, 0b011, 0b101, 0b011],
        'e' => [0b000, 0b010, 0b111, 0b100, 0b011],
        'f' => [0b001, 0b010, 0b111, 0b010, 0b010],
        'g' => [0b000, 0b011, 0b101, 0b011, 0b110],
        'h' => [0b100, 0b100, 0b110, 0b101, 0b101],
        'i' => [0b010, 0b000, 0b010, 0b010, 0b010],
        'j' => [0b001, 0b000, 0b001, 0b101, 0b010],
        'k' => [0b100, 0b101, 0b110, 0b110, 0b101],
        'l' => [0b110, 0b010, 0b010, 0b010, 0b111],
        'm' => [0b000, 0b000, 0b111, 0b111, 0b101],
        'n' => [0b000, 0b000, 0b110, 0b101, 0b101],
        'o' => [0b000, 0b000, 0b010, 0b101, 0b010],
        'p' => [0b000, 0b110, 0b101, 0b110, 0b100],
        'q' => [0b000, 0b011, 0b101, 0b011, 0b001],
        'r' => [0b000, 0b000, 0b011, 0b100, 0b100],
        's' => [0b000, 0b011, 0b110, 0b011, 0b110],
        't' => [0b010, 0b111, 0b010, 0b010, 0b011],
        'u' => [0b000, 0b000, 0b101, 0b101, 0b011],
        'v' => [0b000, 0b000, 0b101, 0b101, 0b010],
        'w' => [0b000, 0b000, 0b101, 0b111, 0b111],
        'x' => [0b000, 0b000, 0b101, 0b010, 0b101],
        'y' => [0b000, 0b101, 0b101, 0b011, 0b110],
        'z' => [0b000, 0b111, 0b011, 0b110, 0b111],
        '[' => [0b110, 0b100, 0b100, 0b100, 0b110],
        ']' => [0b011, 0b001, 0b001, 0b001, 0b011],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '"' => [0b101, 0b101, 0b000, 0b000, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        ';' => [0b000, 0b010, 0b000, 0b010, 0b100],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b111, 0b001, 0b010, 0b000, 0b010],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        ' ' => [0b000; 5],
        _ => [0b111; 5],
    }
}

#[cfg(feature = "system-font")]
pub use system::SystemFont;

#[cfg(feature = "system-font")]
mod system {
    use ndarray::Array2;
    use plotters::style::{FontDesc, FontFamily, FontStyle};

    use super::LabelFont;
    use crate::error::{LensError, Result};

    /// Installed TrueType family (e.g. `"sans-serif"`) rasterized through plotters.
    ///
    /// A fresh font handle is resolved for every call.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct SystemFont {
        family: String,
        size: u32,
    }

    impl SystemFont {
        pub fn new(family: impl Into<String>, size: u32) -> Self {
            Self {
                family: family.into(),
                size: size.max(1),
            }
        }

        fn desc(&self) -> FontDesc<'_> {
            FontDesc::new(
                FontFamily::Name(&self.family),
                f64::from(self.size),
                FontStyle::Normal,
            )
        }
    }

    impl LabelFont for SystemFont {
        fn size(&self) -> u32 {
            self.size
        }

        fn measure(&self, text: &str) -> Result<(usize, usize)> {
            if text.is_empty() {
                return Ok((0, self.size as usize));
            }
            let (width, height) = self.desc().box_size(text).map_err(|err| LensError::Font {
                text: text.to_string(),
                reason: format!("{err:?}"),
            })?;
            Ok((width as usize, height as usize))
        }

        fn rasterize(&self, text: &str) -> Result<Array2<u8>> {
            let (width, height) = self.measure(text)?;
            let mut mask = Array2::<u8>::zeros((height, width));
            if width == 0 {
                return Ok(mask);
            }
            let drawn = self
                .desc()
                .draw(text, (0, 0), |x, y, alpha| {
                    if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
                        let ink = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
                        let cell = &mut mask[[y as usize, x as usize]];
                        *cell = (*cell).max(ink);
                    }
                    Ok::<(), ()>(())
                })
                .map_err(|err| LensError::Font {
                    text: text.to_string(),
                    reason: format!("{err:?}"),
                })?;
            drawn.map_err(|()| LensError::Font {
                text: text.to_string(),
                reason: "glyph callback failed".to_string(),
            })?;
            Ok(mask)
        }
    }
}

#[cfg(feature = "font-file")]
pub use file::FileFont;

#[cfg(feature = "font-file")]
mod file {
    use std::fmt;
    use std::fs;
    use std::path::{Path, PathBuf};

    use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
    use ndarray::Array2;

    use super::LabelFont;
    use crate::error::{LensError, Result};

    /// TrueType/OpenType face read from a font file such as
    /// `assets/fonts/OpenSans-Regular.ttf`. `size` is the em size in pixels.
    pub struct FileFont {
        path: PathBuf,
        size: u32,
        font: FontVec,
    }

    impl FileFont {
        pub fn load(path: impl AsRef<Path>, size: u32) -> Result<Self> {
            let path = path.as_ref();
            let load_error = |reason: String| LensError::FontLoad {
                path: path.to_path_buf(),
                reason,
            };
            let data = fs::read(path).map_err(|err| load_error(err.to_string()))?;
            let font = FontVec::try_from_vec(data).map_err(|err| load_error(err.to_string()))?;
            Ok(Self {
                path: path.to_path_buf(),
                size: size.max(1),
                font,
            })
        }

        /// Pixel scale whose em square spans `size` pixels.
        fn scale(&self) -> PxScale {
            let height = self.font.height_unscaled();
            let em = self.font.units_per_em().unwrap_or(height);
            PxScale::from(self.size as f32 * height / em)
        }

        /// Glyphs on a baseline one ascent below the top edge, with the run's
        /// `(width, height)`.
        fn layout(&self, text: &str) -> (Vec<Glyph>, usize, usize) {
            let scale = self.scale();
            let scaled = self.font.as_scaled(scale);
            let ascent = scaled.ascent();
            let mut caret = 0.0f32;
            let mut previous = None;
            let mut glyphs = Vec::with_capacity(text.len());
            for ch in text.chars() {
                let id = scaled.glyph_id(ch);
                if let Some(prev) = previous {
                    caret += scaled.kern(prev, id);
                }
                glyphs.push(id.with_scale_and_position(scale, point(caret, ascent)));
                caret += scaled.h_advance(id);
                previous = Some(id);
            }
            let width = caret.ceil().max(0.0) as usize;
            let height = (ascent - scaled.descent()).ceil().max(0.0) as usize;
            (glyphs, width, height)
        }
    }

    impl fmt::Debug for FileFont {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileFont")
                .field("path", &self.path)
                .field("size", &self.size)
                .finish_non_exhaustive()
        }
    }

    impl LabelFont for FileFont {
        fn size(&self) -> u32 {
            self.size
        }

        fn measure(&self, text: &str) -> Result<(usize, usize)> {
            let (_, width, height) = self.layout(text);
            Ok((width, height))
        }

        fn rasterize(&self, text: &str) -> Result<Array2<u8>> {
            let (glyphs, width, height) = self.layout(text);
            let mut mask = Array2::<u8>::zeros((height, width));
            for glyph in glyphs {
                let Some(outlined) = self.font.outline_glyph(glyph) else {
                    continue;
                };
                let bounds = outlined.px_bounds();
                let (left, top) = (bounds.min.x as i64, bounds.min.y as i64);
                outlined.draw(|x, y, coverage| {
                    let px = left + i64::from(x);
                    let py = top + i64::from(y);
                    if px < 0 || py < 0 || px as usize >= width || py as usize >= height {
                        return;
                    }
                    let ink = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                    let cell = &mut mask[[py as usize, px as usize]];
                    *cell = (*cell).max(ink);
                });
            }
            Ok(mask)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tempfile::tempdir;

        const CANDIDATES: &[&str] = &[
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/Library/Fonts/Arial.ttf",
        ];

        fn installed_font(size: u32) -> Option<FileFont> {
            CANDIDATES
                .iter()
                .map(Path::new)
                .find(|path| path.is_file())
                .map(|path| FileFont::load(path, size).expect("load installed font"))
        }

        #[test]
        fn non_font_bytes_are_rejected() {
            let dir = tempdir().expect("tempdir");
            let path = dir.path().join("broken.ttf");
            fs::write(&path, b"not a font").expect("write");
            match FileFont::load(&path, 28) {
                Err(LensError::FontLoad { path: reported, .. }) => assert_eq!(reported, path),
                other => panic!("unexpected result: {other:?}"),
            }
            assert!(matches!(
                FileFont::load(dir.path().join("missing.ttf"), 28),
                Err(LensError::FontLoad { .. })
            ));
        }

        #[test]
        fn renders_lowercase_text_from_file() {
            let Some(font) = installed_font(28) else {
                return;
            };
            let (width, height) = font.measure("the").expect("measure");
            assert!(width > 0 && height >= 28);
            assert!(font.measure("the cat").expect("measure").0 > width);

            let lower = font.rasterize("sat").expect("raster");
            let upper = font.rasterize("SAT").expect("raster");
            assert_eq!(lower.dim(), font.measure("sat").map(|(w, h)| (h, w)).expect("measure"));
            assert!(lower.iter().any(|&v| v > 128));
            assert_ne!(lower, upper);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_font_scales_with_size() {
        let font = BlockFont::new(28);
        assert_eq!(font.measure("cat").expect("measure"), (44, 20));
        let small = BlockFont::new(7);
        assert_eq!(small.measure("cat").expect("measure"), (11, 5));
    }

    #[test]
    fn empty_label_has_no_width() {
        let font = BlockFont::new(14);
        assert_eq!(font.measure("").expect("measure"), (0, 10));
        assert_eq!(font.rasterize("").expect("raster").dim(), (10, 0));
    }

    #[test]
    fn raster_matches_measurement() {
        let font = BlockFont::new(14);
        let mask = font.rasterize("[CLS]").expect("raster");
        let (width, height) = font.measure("[CLS]").expect("measure");
        assert_eq!(mask.dim(), (height, width));
        assert!(mask.iter().any(|&v| v == 255));
    }

    #[test]
    fn lowercase_keeps_its_own_glyphs() {
        let font = BlockFont::new(7);
        let lower = font.rasterize("sat").expect("raster");
        let upper = font.rasterize("SAT").expect("raster");
        assert_eq!(lower.dim(), upper.dim());
        assert_ne!(lower, upper);

        let missing = font.rasterize("\u{e9}").expect("raster");
        for ch in ('a'..='z').chain('A'..='Z') {
            let glyph = font.rasterize(&ch.to_string()).expect("raster");
            assert_ne!(glyph, missing, "{ch} falls back to the box glyph");
        }
        assert_eq!(
            font.rasterize("o").expect("raster").row(2).to_vec(),
            vec![0, 255, 0]
        );
    }

    #[test]
    fn glyph_pixels_follow_bit_pattern() {
        let font = BlockFont::new(7);
        let mask = font.rasterize("T").expect("raster");
        assert_eq!(mask.row(0).to_vec(), vec![255, 255, 255]);
        assert_eq!(mask.row(4).to_vec(), vec![0, 255, 0]);
    }
}
