pub const COLOR_BACKGROUND: [u8; 4] = [0, 0, 0, 255];
pub const COLOR_TRANSPARENT: [u8; 4] = [0, 0, 0, 0];
pub const COLOR_LABEL: [u8; 3] = [255, 255, 255];

/// Grayscale shade for an attention weight: 0 is black, 1 is white.
///
/// Intermediate weights map to `round(w * 255)` on every channel, rounding
/// half away from zero (0.5 becomes 128). Weights outside `[0, 1]` are clamped
/// and NaN is drawn as black.
pub fn attention_color(weight: f32) -> [u8; 3] {
    let shade = if weight.is_nan() || weight <= 0.0 {
        0
    } else if weight >= 1.0 {
        255
    } else {
        (weight * 255.0).round() as u8
    };
    [shade; 3]
}
