//! CLI definition for the `lc` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use launchcontainers::ColorMode;

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Cmd {
    /// Build the analysis dir, copy configs into it, and stage per-subject inputs
    Prepare {
        /// Launch config YAML
        #[arg(long = "lc-config", visible_alias = "lcc", value_name = "YAML")]
        lc_config: PathBuf,
        /// Subject-session list (comma or tab delimited)
        #[arg(long = "sub-ses-list", visible_alias = "ssl", value_name = "FILE")]
        sub_ses_list: PathBuf,
        /// Container-specific config JSON
        #[arg(long = "container-config", visible_alias = "cc", value_name = "JSON")]
        container_config: PathBuf,
        /// Tractparams CSV (required for the tractography pipelines)
        #[arg(long = "tractparams", value_name = "CSV")]
        tractparams: Option<PathBuf>,
        /// Overwrite config copies and re-point existing symlinks
        #[arg(long)]
        force: bool,
    },

    /// Generate commands from a prepared analysis dir and dispatch them
    Run {
        /// Analysis dir produced by prepare
        #[arg(short = 'w', long = "workdir", value_name = "DIR")]
        workdir: PathBuf,
        /// Actually submit; without this flag the commands are only printed
        #[arg(long = "run-lc", visible_alias = "run_lc")]
        run_lc: bool,
        /// Skip the interactive confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Audit a finished analysis dir: output counts, logs, error lines
    Qc {
        #[arg(short = 'w', long = "workdir", value_name = "DIR")]
        workdir: PathBuf,
    },

    /// Create a skeleton BIDS dataset
    #[command(visible_alias = "create_bids")]
    CreateBids {
        #[arg(short = 'o', long = "output", value_name = "DIR")]
        output: PathBuf,
    },

    /// Write example launch/subses/container configs for editing
    #[command(visible_alias = "copy_configs")]
    CopyConfigs {
        #[arg(short = 'o', long = "output", value_name = "DIR")]
        output: PathBuf,
    },

    /// Scan a BIDS tree and emit a subject-session list
    #[command(visible_alias = "gen_subses")]
    GenSubses {
        #[arg(short = 'b', long = "bidsdir", value_name = "DIR")]
        bidsdir: PathBuf,
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: PathBuf,
    },

    /// Archive the config artifacts of an analysis dir
    #[command(visible_alias = "zip_configs")]
    ZipConfigs {
        #[arg(short = 'w', long = "workdir", value_name = "DIR")]
        workdir: PathBuf,
        #[arg(short = 'o', long = "output", value_name = "ZIP")]
        output: PathBuf,
    },

    /// Run diagnostics to check runtime and scheduler availability
    Doctor,
}

#[derive(Parser, Debug)]
#[command(
    name = "lc",
    version,
    about = "Prepare and launch containerized neuroimaging analyses over BIDS datasets.",
    after_long_help = "Examples:\n  lc prepare --lcc lc_config.yaml --ssl subseslist.txt --cc anatrois.json\n  lc run -w BIDS/derivatives/anatrois_4.6.1/analysis-01\n  lc run -w BIDS/derivatives/anatrois_4.6.1/analysis-01 --run-lc\n  lc qc -w BIDS/derivatives/anatrois_4.6.1/analysis-01\n"
)]
pub(crate) struct Cli {
    /// Only warnings and errors on the console
    #[arg(long, short = 'q', conflicts_with_all = ["verbose", "debug"])]
    pub(crate) quiet: bool,

    /// Detailed progress on the console
    #[arg(long, conflicts_with = "debug")]
    pub(crate) verbose: bool,

    /// Full debug/trace output on the console
    #[arg(long)]
    pub(crate) debug: bool,

    /// Directory for lc_info.log / lc_error.log
    #[arg(long = "log-dir", value_name = "DIR")]
    pub(crate) log_dir: Option<PathBuf>,

    /// Colorize stderr output: auto|always|never
    #[arg(long = "color", value_enum)]
    pub(crate) color: Option<ColorMode>,

    #[command(subcommand)]
    pub(crate) command: Cmd,
}
