use std::path::PathBuf;

use clap::ValueHint;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, clap::ValueEnum)]
pub enum LogFormat {
    Compact,
    Full,
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Compact => f.write_str("compact"),
            LogFormat::Full => f.write_str("full"),
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, clap::Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Logging output filters; comma-separated
    #[arg(
        short,
        long,
        default_value = "warn,gltf_tuner=info,tune_tile=info",
        env = "TUNE_TILE_LOG_FILTER"
    )]
    pub log_filter: String,
    /// Logging output format
    #[arg(long, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
    /// JSON file of material grouping rules
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub material_rules: Option<PathBuf>,
    /// JSON file of animation grouping rules
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub anim4d_rules: Option<PathBuf>,
    /// Merge primitives even if no rule file was given
    #[arg(short, long)]
    pub tune_without_rules: bool,
    /// Directory receiving the tuned `.glb` files
    #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath)]
    pub out_dir: PathBuf,
    /// Maximum number of tiles tuned at once; defaults to the available parallelism
    #[arg(short, long)]
    pub jobs: Option<usize>,
    /// Tiles to tune (`.gltf` or `.glb`)
    #[arg(num_args = 1.., required = true, value_hint = ValueHint::FilePath)]
    pub files: Vec<PathBuf>,
}

/// Set up log output on stderr, as requested by `cli`.
pub(crate) fn initialize_tracing(cli: &Cli) {
    let tsub = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::OffsetTime::new(
            time::UtcOffset::current_local_offset().unwrap_or_else(|e| {
                tracing::warn!("couldn't get local time offset: {:?}", e);
                time::UtcOffset::UTC
            }),
            time::macros::format_description!("[hour]:[minute]:[second]"),
        ))
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_env_filter(cli.log_filter.as_str());

    match cli.log_format {
        LogFormat::Compact => tsub.compact().init(),
        LogFormat::Full => tsub.init(),
        LogFormat::Pretty => tsub.pretty().init(),
        LogFormat::Json => tsub.json().init(),
    }
}
