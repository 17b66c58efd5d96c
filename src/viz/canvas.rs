use std::fs;
use std::io;
use std::path::Path;

use image::{ImageError, ImageFormat, RgbaImage, imageops};
use ndarray::{Array3, ArrayView2, s};

use crate::error::{LensError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Rect {
    pub fn from_origin(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + width,
            y1: y + height,
        }
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }
}

/// RGBA8 raster stored as `[row, column, channel]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    pixels: Array3<u8>,
}

impl Canvas {
    pub fn new(width: usize, height: usize, fill: [u8; 4]) -> Self {
        let mut pixels = Array3::<u8>::zeros((height, width, 4));
        for mut px in pixels.lanes_mut(ndarray::Axis(2)) {
            px.assign(&ndarray::aview1(&fill));
        }
        Self { pixels }
    }

    pub fn transparent(width: usize, height: usize) -> Self {
        Self {
            pixels: Array3::zeros((height, width, 4)),
        }
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let px = self.pixels.slice(s![y, x, ..]);
        [px[0], px[1], px[2], px[3]]
    }

    /// Opaque fill, clipped to the canvas bounds.
    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 3]) {
        let x0 = rect.x0.min(self.width());
        let x1 = rect.x1.min(self.width());
        let y0 = rect.y0.min(self.height());
        let y1 = rect.y1.min(self.height());
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let rgba = [color[0], color[1], color[2], 255];
        let mut region = self.pixels.slice_mut(s![y0..y1, x0..x1, ..]);
        for mut px in region.lanes_mut(ndarray::Axis(2)) {
            px.assign(&ndarray::aview1(&rgba));
        }
    }

    /// Blend `color` through a `[row, column]` coverage mask whose top-left
    /// corner lands at `(x, y)`. Parts of the mask outside the canvas are
    /// dropped, so `x`/`y` may be negative.
    pub fn draw_coverage(&mut self, x: i64, y: i64, coverage: ArrayView2<'_, u8>, color: [u8; 3]) {
        let (width, height) = (self.width() as i64, self.height() as i64);
        for ((row, col), &alpha) in coverage.indexed_iter() {
            if alpha == 0 {
                continue;
            }
            let px = x + col as i64;
            let py = y + row as i64;
            if px < 0 || py < 0 || px >= width || py >= height {
                continue;
            }
            self.blend(px as usize, py as usize, [color[0], color[1], color[2], alpha]);
        }
    }

    /// Quarter turn counter-clockwise: the top-right corner moves to the top-left.
    pub fn rotate_ccw(&self) -> Self {
        Self::from_rgba_image(imageops::rotate270(&self.to_rgba_image()))
    }

    /// Paste `layer` over this canvas using the layer's alpha channel as the mask.
    pub fn composite(&mut self, layer: &Canvas) {
        let mut base = self.to_rgba_image();
        imageops::overlay(&mut base, &layer.to_rgba_image(), 0, 0);
        *self = Self::from_rgba_image(base);
    }

    /// Source-over blend of a straight-alpha RGBA value, in integer math so
    /// partial coverage rounds to nearest.
    fn blend(&mut self, x: usize, y: usize, src: [u8; 4]) {
        let dst = self.pixel(x, y);
        let sa = u32::from(src[3]);
        let da = u32::from(dst[3]);
        // out_a scaled by 255: sa*255 + da*(255 - sa)
        let out_a = sa * 255 + da * (255 - sa);
        let mut out = [0u8; 4];
        if out_a != 0 {
            for ch in 0..3 {
                let num = u32::from(src[ch]) * sa * 255 + u32::from(dst[ch]) * da * (255 - sa);
                out[ch] = ((num + out_a / 2) / out_a) as u8;
            }
            out[3] = ((out_a + 127) / 255) as u8;
        }
        self.pixels
            .slice_mut(s![y, x, ..])
            .assign(&ndarray::aview1(&out));
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        let pixels = Array3::from_shape_vec((height, width, 4), image.into_raw())
            .unwrap_or_else(|_| Array3::zeros((height, width, 4)));
        Self { pixels }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let (height, width, _) = self.pixels.dim();
        let raw = self.pixels.as_standard_layout().iter().copied().collect();
        RgbaImage::from_raw(width as u32, height as u32, raw)
            .unwrap_or_else(|| RgbaImage::new(width as u32, height as u32))
    }

    /// Write as RGBA PNG, replacing any existing file.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| LensError::render_io(path, err))?;
        }
        self.to_rgba_image()
            .save_with_format(path, ImageFormat::Png)
            .map_err(|err| LensError::render_io(path, into_io_error(err)))
    }
}

fn into_io_error(err: ImageError) -> io::Error {
    match err {
        ImageError::IoError(err) => err,
        other => io::Error::other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn new_canvas_is_filled() {
        let canvas = Canvas::new(3, 2, [1, 2, 3, 255]);
        assert_eq!(canvas.width(), 3);
        assert_eq!(canvas.height(), 2);
        assert_eq!(canvas.pixel(2, 1), [1, 2, 3, 255]);
    }

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut canvas = Canvas::new(4, 4, [0, 0, 0, 255]);
        canvas.fill_rect(Rect::from_origin(2, 2, 10, 10), [9, 9, 9]);
        assert_eq!(canvas.pixel(1, 1), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(3, 3), [9, 9, 9, 255]);
    }

    #[test]
    fn coverage_blends_over_opaque_background() {
        let mut canvas = Canvas::new(2, 1, [0, 0, 0, 255]);
        canvas.draw_coverage(0, 0, array![[255u8, 128]].view(), [255, 255, 255]);
        assert_eq!(canvas.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(1, 0), [128, 128, 128, 255]);
    }

    #[test]
    fn coverage_on_transparent_layer_keeps_color() {
        let mut layer = Canvas::transparent(1, 1);
        layer.draw_coverage(0, 0, array![[100u8]].view(), [255, 255, 255]);
        assert_eq!(layer.pixel(0, 0), [255, 255, 255, 100]);
    }

    #[test]
    fn coverage_outside_canvas_is_clipped() {
        let mut canvas = Canvas::new(2, 2, [0, 0, 0, 255]);
        canvas.draw_coverage(-1, 1, array![[255u8, 255], [255, 255]].view(), [7, 7, 7]);
        assert_eq!(canvas.pixel(0, 1), [7, 7, 7, 255]);
        assert_eq!(canvas.pixel(1, 1), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn rotation_moves_top_right_to_top_left() {
        let mut canvas = Canvas::transparent(3, 2);
        canvas.fill_rect(Rect::from_origin(2, 0, 1, 1), [200, 0, 0]);
        let rotated = canvas.rotate_ccw();
        assert_eq!(rotated.width(), 2);
        assert_eq!(rotated.height(), 3);
        assert_eq!(rotated.pixel(0, 0), [200, 0, 0, 255]);
        assert_eq!(rotated.pixel(1, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn composite_respects_layer_alpha() {
        let mut base = Canvas::new(2, 1, [0, 0, 0, 255]);
        let mut layer = Canvas::transparent(2, 1);
        layer.fill_rect(Rect::from_origin(1, 0, 1, 1), [255, 255, 255]);
        base.composite(&layer);
        assert_eq!(base.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(base.pixel(1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn rotation_keeps_label_layer_pixels() {
        let mut layer = Canvas::transparent(4, 2);
        layer.draw_coverage(1, 1, array![[255u8, 90]].view(), [255, 255, 255]);
        let rotated = layer.rotate_ccw();
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
        assert_eq!(rotated.pixel(1, 2), [255, 255, 255, 255]);
        assert_eq!(rotated.pixel(1, 1), [255, 255, 255, 90]);
        assert_eq!(Canvas::from_rgba_image(rotated.to_rgba_image()), rotated);
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("canvas.png");
        let mut canvas = Canvas::new(3, 3, [0, 0, 0, 255]);
        canvas.fill_rect(Rect::from_origin(1, 1, 1, 1), [128, 128, 128]);
        canvas.save_png(&path).expect("save");

        let decoded = image::open(&path).expect("open").to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 3));
        assert_eq!(decoded.get_pixel(1, 1).0, [128, 128, 128, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }
}
