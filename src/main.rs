use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covtrend::cli::{self, Style};
use covtrend::db;
use covtrend::model::Metadata;

/// covtrend — Coverage history tracking for LCOV and Cobertura reports.
#[derive(Parser)]
#[command(name = "covtrend", version, about)]
struct Cli {
    /// Path to the SQLite database.
    #[arg(long, global = true, env = "COVTREND_DB", default_value = ".covtrend.db")]
    db: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a coverage file and store it in the history.
    Ingest {
        /// Path to the coverage file.
        file: PathBuf,

        /// Override format detection (lcov, cobertura).
        #[arg(long)]
        format: Option<String>,

        /// Git branch the report was produced on.
        #[arg(long, default_value = "")]
        branch: String,

        /// Commit SHA the report was produced from.
        #[arg(long, default_value = "")]
        commit: String,

        /// Free-form tag, e.g. a release name.
        #[arg(long, default_value = "")]
        tag: String,
    },

    /// Show a stored report. If no id is given, shows the most recent.
    Show {
        id: Option<String>,

        #[arg(long, value_enum, default_value_t = Style::Text)]
        style: Style,
    },

    /// List stored reports, newest first.
    Reports {
        #[arg(long)]
        branch: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Compare two reports. Defaults to the two most recent.
    Diff {
        /// Older report id.
        old: Option<String>,

        /// Newer report id (default: most recent).
        new: Option<String>,

        /// Restrict the default report selection to one branch.
        #[arg(long)]
        branch: Option<String>,

        #[arg(long, value_enum, default_value_t = Style::Text)]
        style: Style,

        /// Emit the diff as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render a report as a standalone HTML page.
    Html {
        id: Option<String>,

        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show the coverage trend, oldest first.
    Trend {
        #[arg(long)]
        branch: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Print a coverage badge for a percentage or a stored report.
    Badge {
        /// Coverage percentage. Overrides --report.
        pct: Option<f64>,

        /// Report id (default: most recent).
        #[arg(long)]
        report: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Aggregate statistics over the whole history.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Delete a report from the database.
    Delete {
        /// Report id to delete.
        id: String,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut conn = db::open(&cli.db).context("Failed to open database")?;
    db::init_schema(&conn).context("Failed to initialize schema")?;

    let output = match cli.command {
        Commands::Ingest {
            file,
            format,
            branch,
            commit,
            tag,
        } => {
            let metadata = Metadata {
                branch,
                commit_sha: commit,
                tag,
            };
            cli::cmd_ingest(&mut conn, &file, format.as_deref(), metadata)?
        }
        Commands::Show { id, style } => cli::cmd_show(&conn, id.as_deref(), style)?,
        Commands::Reports { branch, limit } => cli::cmd_reports(&conn, branch.as_deref(), limit)?,
        Commands::Diff {
            old,
            new,
            branch,
            style,
            json,
        } => cli::cmd_diff(
            &conn,
            old.as_deref(),
            new.as_deref(),
            branch.as_deref(),
            style,
            json,
        )?,
        Commands::Html { id, output } => {
            let html = cli::cmd_html(&conn, id.as_deref())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, html)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    format!("Wrote {}\n", path.display())
                }
                None => html,
            }
        }
        Commands::Trend {
            branch,
            limit,
            json,
        } => cli::cmd_trend(&conn, branch.as_deref(), limit, json)?,
        Commands::Badge { pct, report, json } => {
            cli::cmd_badge(&conn, pct, report.as_deref(), json)?
        }
        Commands::Stats { json } => cli::cmd_stats(&conn, json)?,
        Commands::Delete { id } => cli::cmd_delete(&mut conn, &id)?,
    };

    print!("{}", output);
    Ok(())
}
