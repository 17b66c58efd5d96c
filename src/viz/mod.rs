pub mod canvas;
pub mod diagram;
pub mod font;
pub mod palette;
pub mod sweep;

pub use canvas::{Canvas, Rect};
pub use diagram::{DEFAULT_GRID_UNIT, DEFAULT_LABEL_MARGIN, DiagramLayout, DiagramRenderer};
#[cfg(feature = "font-file")]
pub use font::FileFont;
#[cfg(feature = "system-font")]
pub use font::SystemFont;
pub use font::{BlockFont, LabelFont};
pub use palette::attention_color;
pub use sweep::{AttentionSweep, DiagramId, SweepReport};
