pub mod core;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use toml::{Table, Value};

pub use self::core::{AppConfig, FontConfig, RankingConfig, RenderConfig};

/// Load and merge TOML files in order; later files override earlier ones
/// key by key, nested tables included.
pub fn load_config(paths: &[PathBuf]) -> Result<AppConfig> {
    let mut merged = Table::new();
    for path in paths {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let table: Table = toml::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        merge_tables(&mut merged, table);
    }

    Value::Table(merged)
        .try_into()
        .context("failed to build configuration from merged files")
}

fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        let value = match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming))
                if same_variant(&*existing, &incoming) =>
            {
                merge_tables(existing, incoming);
                continue;
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
}

/// A table that switches its `type` tag replaces the old one outright, so
/// fields of the previous variant are not carried over.
fn same_variant(existing: &Table, incoming: &Table) -> bool {
    match incoming.get("type") {
        Some(tag) => existing.get("type") == Some(tag),
        None => true,
    }
}
