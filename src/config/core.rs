use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ranking::DEFAULT_TOP_K;
use crate::viz::{BlockFont, DEFAULT_GRID_UNIT, DEFAULT_LABEL_MARGIN, DiagramLayout, LabelFont};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RankingConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RenderConfig {
    #[serde(default = "default_grid_unit")]
    pub grid_unit: usize,
    #[serde(default = "default_label_margin")]
    pub label_margin: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub font: FontConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            grid_unit: default_grid_unit(),
            label_margin: default_label_margin(),
            output_dir: default_output_dir(),
            workers: default_workers(),
            font: FontConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn layout(&self) -> DiagramLayout {
        DiagramLayout {
            grid_unit: self.grid_unit,
            label_margin: self.label_margin,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FontConfig {
    Block {
        #[serde(default = "default_font_size")]
        size: u32,
    },
    System {
        #[serde(default = "default_font_family")]
        family: String,
        #[serde(default = "default_font_size")]
        size: u32,
    },
    /// TrueType/OpenType file, e.g. `assets/fonts/OpenSans-Regular.ttf`.
    File {
        path: PathBuf,
        #[serde(default = "default_font_size")]
        size: u32,
    },
}

impl Default for FontConfig {
    fn default() -> Self {
        Self::Block {
            size: default_font_size(),
        }
    }
}

impl FontConfig {
    pub fn size(&self) -> u32 {
        match self {
            Self::Block { size } | Self::System { size, .. } | Self::File { size, .. } => *size,
        }
    }

    pub fn set_size(&mut self, value: u32) {
        match self {
            Self::Block { size } | Self::System { size, .. } | Self::File { size, .. } => {
                *size = value
            }
        }
    }

    pub fn build(&self) -> anyhow::Result<Box<dyn LabelFont>> {
        match self {
            Self::Block { size } => Ok(Box::new(BlockFont::new(*size))),
            #[cfg(feature = "system-font")]
            Self::System { family, size } => {
                Ok(Box::new(crate::viz::SystemFont::new(family.clone(), *size)))
            }
            #[cfg(not(feature = "system-font"))]
            Self::System { family, .. } => Err(anyhow::anyhow!(
                "system font {family:?} requested but this build lacks the `system-font` feature; rebuild with `--features system-font`"
            )),
            #[cfg(feature = "font-file")]
            Self::File { path, size } => Ok(Box::new(crate::viz::FileFont::load(path, *size)?)),
            #[cfg(not(feature = "font-file"))]
            Self::File { path, .. } => Err(anyhow::anyhow!(
                "font file {} requested but this build lacks the `font-file` feature; rebuild with `--features font-file`",
                path.display()
            )),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_grid_unit() -> usize {
    DEFAULT_GRID_UNIT
}

fn default_label_margin() -> usize {
    DEFAULT_LABEL_MARGIN
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_workers() -> usize {
    1
}

fn default_font_size() -> u32 {
    28
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}
