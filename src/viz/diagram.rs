//! One grid diagram per attention head.
//!
//! ```text
//!  +-------------+----------------------+
//!  |             | rotated key labels   |
//!  |   margin    |   (read upward)      |
//!  +-------------+----+----+----+-------+
//!  | query label |    |    |    |       |
//!  | query label |    cells (i, j)      |
//!  +-------------+----+----+----+-------+
//! ```
//!
//! Rows are query tokens and columns are key tokens, matching the tensor's axis
//! order. Cell brightness is the attention weight.

use ndarray::ArrayView2;

use super::canvas::{Canvas, Rect};
use super::font::LabelFont;
use super::palette::{COLOR_BACKGROUND, COLOR_LABEL, attention_color};
use crate::error::{LensError, Result};

pub const DEFAULT_GRID_UNIT: usize = 40;
pub const DEFAULT_LABEL_MARGIN: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagramLayout {
    /// Side of one grid cell in pixels.
    pub grid_unit: usize,
    /// Space reserved left of and above the grid for token labels.
    pub label_margin: usize,
}

impl Default for DiagramLayout {
    fn default() -> Self {
        Self {
            grid_unit: DEFAULT_GRID_UNIT,
            label_margin: DEFAULT_LABEL_MARGIN,
        }
    }
}

impl DiagramLayout {
    pub fn side(&self, tokens: usize) -> usize {
        self.label_margin + self.grid_unit * tokens
    }

    /// Offset of token `index` along either axis.
    pub fn offset(&self, index: usize) -> usize {
        self.label_margin + index * self.grid_unit
    }

    pub fn cell(&self, row: usize, col: usize) -> Rect {
        Rect::from_origin(
            self.offset(col),
            self.offset(row),
            self.grid_unit,
            self.grid_unit,
        )
    }
}

pub struct DiagramRenderer<'a> {
    layout: DiagramLayout,
    font: &'a dyn LabelFont,
}

impl<'a> DiagramRenderer<'a> {
    pub fn new(layout: DiagramLayout, font: &'a dyn LabelFont) -> Self {
        Self { layout, font }
    }

    /// Render one head's `[query, key]` weights with `tokens` along both axes.
    pub fn render(&self, tokens: &[String], weights: ArrayView2<'_, f32>) -> Result<Canvas> {
        let count = tokens.len();
        if weights.dim() != (count, count) {
            let (rows, cols) = weights.dim();
            return Err(LensError::MalformedAttention {
                reason: format!("expected a {count}x{count} head matrix, got {rows}x{cols}"),
            });
        }

        let side = self.layout.side(count);
        let mut canvas = Canvas::new(side, side, COLOR_BACKGROUND);
        self.draw_row_labels(&mut canvas, tokens)?;
        self.draw_column_labels(&mut canvas, tokens)?;

        for ((row, col), &weight) in weights.indexed_iter() {
            canvas.fill_rect(self.layout.cell(row, col), attention_color(weight));
        }

        Ok(canvas)
    }

    /// Right-aligned against the grid's left edge.
    fn draw_row_labels(&self, canvas: &mut Canvas, tokens: &[String]) -> Result<()> {
        let margin = self.layout.label_margin as i64;
        for (idx, token) in tokens.iter().enumerate() {
            let mask = self.font.rasterize(token)?;
            let width = mask.dim().1 as i64;
            canvas.draw_coverage(
                margin - width,
                self.layout.offset(idx) as i64,
                mask.view(),
                COLOR_LABEL,
            );
        }
        Ok(())
    }

    /// Labels are laid out horizontally on a transparent layer at the right
    /// edge, turned a quarter counter-clockwise so they stand on the grid's
    /// top edge, then pasted through the layer's alpha.
    fn draw_column_labels(&self, canvas: &mut Canvas, tokens: &[String]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        let side = canvas.width();
        let start = side.saturating_sub(self.layout.label_margin) as i64;
        let mut layer = Canvas::transparent(side, side);
        for (idx, token) in tokens.iter().enumerate() {
            let mask = self.font.rasterize(token)?;
            layer.draw_coverage(start, self.layout.offset(idx) as i64, mask.view(), COLOR_LABEL);
        }
        canvas.composite(&layer.rotate_ccw());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::font::BlockFont;
    use ndarray::{Array2, array};

    const SMALL: DiagramLayout = DiagramLayout {
        grid_unit: 8,
        label_margin: 30,
    };

    fn labels(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn canvas_side_grows_with_tokens() {
        let layout = DiagramLayout::default();
        assert_eq!(layout.side(0), 200);
        assert_eq!(layout.side(7), 480);
        assert_eq!(layout.cell(1, 2), Rect::from_origin(280, 240, 40, 40));
    }

    #[test]
    fn cells_follow_query_rows_and_key_columns() {
        let font = BlockFont::new(7);
        let renderer = DiagramRenderer::new(SMALL, &font);
        let weights = array![[1.0f32, 0.0], [0.5, 0.25]];
        let canvas = renderer.render(&labels(&["a", "b"]), weights.view()).expect("render");

        assert_eq!(canvas.width(), 46);
        assert_eq!(canvas.height(), 46);
        assert_eq!(canvas.pixel(31, 31), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(40, 31), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(31, 40), [128, 128, 128, 255]);
        assert_eq!(canvas.pixel(45, 45), [64, 64, 64, 255]);
    }

    #[test]
    fn single_token_renders_one_cell_and_both_labels() {
        let font = BlockFont::new(7);
        let renderer = DiagramRenderer::new(SMALL, &font);
        let canvas = renderer
            .render(&labels(&["t"]), array![[0.5f32]].view())
            .expect("render");
        assert_eq!(canvas.width(), 38);
        assert_eq!(canvas.pixel(34, 34), [128, 128, 128, 255]);

        // "T" is 3px wide: its top bar ends at the grid's left edge.
        assert_eq!(canvas.pixel(27, 30), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(29, 30), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(26, 30), [0, 0, 0, 255]);

        // Rotated, the top bar becomes the column label's leftmost stroke,
        // running up from the grid's top edge.
        assert_eq!(canvas.pixel(30, 29), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(30, 27), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(30, 26), [0, 0, 0, 255]);
    }

    #[test]
    fn empty_sequence_renders_blank_margin() {
        let font = BlockFont::new(7);
        let renderer = DiagramRenderer::new(SMALL, &font);
        let canvas = renderer
            .render(&[], Array2::<f32>::zeros((0, 0)).view())
            .expect("render");
        assert_eq!((canvas.width(), canvas.height()), (30, 30));
        assert_eq!(canvas.pixel(29, 29), [0, 0, 0, 255]);
    }

    #[test]
    fn mismatched_matrix_is_rejected() {
        let font = BlockFont::new(7);
        let renderer = DiagramRenderer::new(SMALL, &font);
        let err = renderer
            .render(&labels(&["a", "b", "c"]), array![[1.0f32]].view())
            .unwrap_err();
        assert!(matches!(err, LensError::MalformedAttention { .. }));
    }

    #[test]
    fn rendering_is_deterministic() {
        let font = BlockFont::new(14);
        let renderer = DiagramRenderer::new(SMALL, &font);
        let tokens = labels(&["[CLS]", "the", "[MASK]", "."]);
        let weights = Array2::from_shape_fn((4, 4), |(i, j)| ((i * 4 + j) as f32) / 15.0);
        let first = renderer.render(&tokens, weights.view()).expect("render");
        let second = renderer.render(&tokens, weights.view()).expect("render");
        assert_eq!(first, second);
    }
}
