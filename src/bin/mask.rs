use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use burn_ndarray::NdArray;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mask_attention::{
    AppConfig, CandidateRanker, FontConfig, InferenceRecord, LensError, WordPieceVocab,
    load_config, pipeline,
};

type Backend = NdArray<f32>;

fn main() {
    if let Err(err) = run() {
        match err.downcast_ref::<LensError>() {
            Some(lens) if lens.is_missing_mask() => eprintln!("{lens}"),
            _ => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut config_paths = Vec::new();
    let base = PathBuf::from("config/base.toml");
    if base.is_file() {
        config_paths.push(base);
    }
    config_paths.extend(args.config.clone());
    let mut config = if config_paths.is_empty() {
        AppConfig::default()
    } else {
        load_config(&config_paths)?
    };
    apply_overrides(&mut config, &args)?;

    let record = InferenceRecord::load(&args.record)?;
    let vocab = WordPieceVocab::load(&args.vocab)?;
    info!(
        record = %args.record.display(),
        tokens = record.tokens.len(),
        vocabulary = vocab.len(),
        "loaded inference record"
    );

    let device = Default::default();
    let ranker = CandidateRanker::new(config.ranking.top_k);
    let prediction = pipeline::predict::<Backend>(&record, &vocab, &ranker, &device)?;

    // Sentences go out before any diagram is drawn; a failed sweep keeps them.
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for candidate in &prediction.candidates {
        writeln!(out, "{}", candidate.sentence).context("failed to write candidate")?;
    }
    out.flush().context("failed to flush stdout")?;
    drop(out);

    let font = config.render.font.build()?;
    let report = pipeline::visualize(&record, &config.render, font.as_ref())?;
    info!(
        diagrams = report.len(),
        output_dir = %config.render.output_dir.display(),
        "attention diagrams written"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_overrides(config: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(top_k) = args.top_k {
        config.ranking.top_k = top_k;
    }
    if let Some(dir) = &args.output_dir {
        config.render.output_dir = dir.clone();
    }
    if let Some(workers) = args.workers {
        config.render.workers = workers.max(1);
    }
    if let Some(unit) = args.grid_unit {
        config.render.grid_unit = unit;
    }
    if let Some(margin) = args.label_margin {
        config.render.label_margin = margin;
    }

    let size = args
        .font_size
        .unwrap_or_else(|| config.render.font.size());
    match args.font {
        Some(FontArg::Block) => config.render.font = FontConfig::Block { size },
        Some(FontArg::System) => {
            let family = match (&args.font_family, &config.render.font) {
                (Some(family), _) => family.clone(),
                (None, FontConfig::System { family, .. }) => family.clone(),
                (None, _) => "sans-serif".to_string(),
            };
            config.render.font = FontConfig::System { family, size };
        }
        Some(FontArg::File) => {
            let path = match (&args.font_file, &config.render.font) {
                (Some(path), _) => path.clone(),
                (None, FontConfig::File { path, .. }) => path.clone(),
                (None, _) => return Err(anyhow!("`--font file` needs `--font-file <PATH>`")),
            };
            config.render.font = FontConfig::File { path, size };
        }
        None => {
            config.render.font.set_size(size);
            match (&mut config.render.font, &args.font_family, &args.font_file) {
                (FontConfig::System { family, .. }, Some(value), _) => *family = value.clone(),
                (FontConfig::File { path, .. }, _, Some(value)) => *path = value.clone(),
                _ => {}
            }
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Rank fill-mask candidates and render one attention diagram per head"
)]
struct Args {
    /// Inference record (JSON) produced by a masked language model run.
    #[arg(value_name = "RECORD")]
    record: PathBuf,
    /// WordPiece vocabulary used to decode candidate token ids.
    #[arg(long, value_name = "PATH")]
    vocab: PathBuf,
    /// Additional configuration files applied in order (later files override earlier ones).
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Vec<PathBuf>,
    /// Number of candidates to print.
    #[arg(long, value_name = "K")]
    top_k: Option<usize>,
    /// Directory receiving the `Attention_Layer<L>_Head<H>.png` files.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Render diagrams on this many threads.
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
    /// Cell side in pixels.
    #[arg(long, value_name = "PX")]
    grid_unit: Option<usize>,
    /// Width of the label strip in pixels.
    #[arg(long, value_name = "PX")]
    label_margin: Option<usize>,
    /// Label font backend.
    #[arg(long, value_enum)]
    font: Option<FontArg>,
    /// Font family for `--font=system`.
    #[arg(long, value_name = "NAME")]
    font_family: Option<String>,
    /// TrueType/OpenType file for `--font=file`.
    #[arg(long, value_name = "PATH")]
    font_file: Option<PathBuf>,
    #[arg(long, value_name = "PT")]
    font_size: Option<u32>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FontArg {
    Block,
    System,
    File,
}
