use clap::{Parser, Subcommand, ValueEnum};
use media_dedupe_core::DedupeMode;

#[derive(Debug, Parser)]
#[command(name = "media-dedupe")]
#[command(about = "Group near-duplicate media and pick one keeper per group", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Single,
    TwoPhase,
    Both,
}

impl From<ModeArg> for DedupeMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Single => DedupeMode::Single,
            ModeArg::TwoPhase => DedupeMode::TwoPhase,
            ModeArg::Both => DedupeMode::Both,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Group a scanner table and write the deduped output table(s)
    Dedupe {
        /// SQLite database holding the scanner table
        #[arg(long, default_value = "media.db")]
        db: String,
        /// Scanner table to read
        #[arg(short, long)]
        table: String,
        /// Output table name (only when a single result set is produced)
        #[arg(long)]
        target: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Max Hamming distance for single-phase grouping
        #[arg(long)]
        single_threshold: Option<u32>,
        /// Max Hamming distance for the coarse pass
        #[arg(long)]
        coarse_threshold: Option<u32>,
        /// Max Hamming distance for the fine pass
        #[arg(long)]
        fine_threshold: Option<u32>,
        /// Do not link records with equal content hashes
        #[arg(long)]
        no_exact: bool,
        /// Compare across directories instead of within each one
        #[arg(long)]
        no_scope: bool,
        /// Also write the output rows as CSV
        #[arg(long)]
        csv: Option<String>,
    },
    /// Per-directory totals of an output table
    Summary {
        #[arg(long, default_value = "media.db")]
        db: String,
        /// Output table written by `dedupe`
        #[arg(short, long)]
        table: String,
    },
    /// Show recent dedupe runs
    Runs {
        #[arg(long, default_value = "media.db")]
        db: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Print configuration values
    PrintConfig,
}
