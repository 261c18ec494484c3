//! prepare_notebooks_for_colab - adapt tutorial notebooks for Google Colab
//!
//! Reads every notebook under `--input-dir`, inserts a package setup cell,
//! rewrites relative asset paths to remote URLs and writes the result under
//! `--output-dir` with the same relative layout.
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - One or more notebooks failed, or `--check` found stale output
//! - `2` - Invalid arguments or options
//! - `3` - Input directory not found

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use colabprep_notebook::{
    FileStatus, NotebookColabAdapter, NotebookError, RewriteOptions, RunOptions, RunReport,
};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use std::time::Instant;

const EXIT_FAILURE: i32 = 1;
const EXIT_INVALID_ARGS: i32 = 2;
const EXIT_INPUT_NOT_FOUND: i32 = 3;

/// Verbosity level for output control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Verbosity {
    /// Suppress all output except errors
    Quiet,
    /// Normal output (default)
    Normal,
    /// Verbose output with extra details
    Verbose,
}

impl Verbosity {
    /// Create from CLI flags
    const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Check if output should be shown (not quiet)
    const fn should_show_output(self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Check if verbose output is requested
    const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Default `RUST_LOG` filter for this level
    const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "debug",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "prepare_notebooks_for_colab",
    about = "Adapt Jupyter notebooks so they run in Google Colab",
    long_about = "Adapt Jupyter notebooks so they run in Google Colab.\n\
                  \n\
                  Every .ipynb under --input-dir is copied to the same relative path under\n\
                  --output-dir with a package setup cell inserted first and relative asset\n\
                  paths (e.g. \"./images/image_1.jpg\") rewritten to remote URLs.\n\
                  \n\
                  Defaults can be set in .colabprep.toml (project) or ~/.colabprep.toml (user).",
    version
)]
struct Args {
    /// Directory containing the authored notebooks
    #[arg(long, value_name = "DIR")]
    input_dir: PathBuf,

    /// Directory receiving the adapted notebooks
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Remote root replacing relative asset paths
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Package installed by the setup cell (repeatable, replaces configured list)
    #[arg(long = "package", value_name = "SPEC")]
    packages: Vec<String>,

    /// Directory name treated as an asset directory (repeatable, replaces configured list)
    #[arg(long = "asset-dir", value_name = "NAME")]
    asset_dirs: Vec<String>,

    /// Clear cell outputs and execution counters
    #[arg(long)]
    clear_outputs: bool,

    /// Do not insert the setup cell
    #[arg(long)]
    no_setup_cell: bool,

    /// Do not rewrite asset paths
    #[arg(long)]
    no_rewrite_paths: bool,

    /// Show what would be written without writing
    #[arg(long)]
    dry_run: bool,

    /// Exit with status 1 if any output is missing or out of date (implies --dry-run)
    #[arg(long)]
    check: bool,

    /// Stop at the first notebook that fails
    #[arg(long)]
    fail_fast: bool,

    /// Configuration file to use instead of ./.colabprep.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Show detailed processing information
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
}

impl Args {
    /// Overlay command-line flags on configured options
    fn apply_overrides(&self, options: &mut RewriteOptions) {
        if let Some(base_url) = &self.base_url {
            options.base_url.clone_from(base_url);
        }
        if !self.packages.is_empty() {
            options.packages.clone_from(&self.packages);
        }
        if !self.asset_dirs.is_empty() {
            options.asset_dirs.clone_from(&self.asset_dirs);
        }
        if self.clear_outputs {
            options.clear_outputs = true;
        }
        if self.no_setup_cell {
            options.setup_cell = false;
        }
        if self.no_rewrite_paths {
            options.rewrite_paths = false;
        }
    }
}

fn main() {
    let args = Args::parse();
    let verbosity = Verbosity::from_flags(args.quiet, args.verbose);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(verbosity.log_filter()))
        .target(env_logger::Target::Stderr)
        .init();

    let code = match run(&args, verbosity) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<NotebookError>() {
        Some(NotebookError::InputNotFound { .. }) => EXIT_INPUT_NOT_FOUND,
        Some(NotebookError::InvalidOption(_)) => EXIT_INVALID_ARGS,
        _ => EXIT_FAILURE,
    }
}

fn run(args: &Args, verbosity: Verbosity) -> Result<i32> {
    let config = Config::resolve(args.config.as_deref())?;

    let mut options = config.rewrite_options();
    args.apply_overrides(&mut options);
    log::debug!("Rewrite options: {options:?}");

    let run_options = RunOptions {
        dry_run: args.dry_run || args.check,
        fail_fast: args.fail_fast || config.fail_fast(),
    };

    let adapter = NotebookColabAdapter::new(options).context("Invalid rewrite options")?;

    let start_time = Instant::now();
    let report = adapter
        .run(&args.input_dir, &args.output_dir, run_options)
        .with_context(|| {
            format!(
                "Failed to adapt notebooks from {}",
                args.input_dir.display()
            )
        })?;

    print_files(&report, verbosity);
    if verbosity.should_show_output() {
        print_summary(&report, start_time.elapsed().as_secs_f64());
    }

    if !report.is_success() {
        return Ok(EXIT_FAILURE);
    }

    if args.check && report.changed() > 0 {
        eprintln!(
            "{} {} notebook(s) in {} are missing or out of date",
            "Error:".red().bold(),
            report.changed(),
            args.output_dir.display()
        );
        return Ok(EXIT_FAILURE);
    }

    Ok(0)
}

fn print_files(report: &RunReport, verbosity: Verbosity) {
    for outcome in &report.outcomes {
        let show = match outcome.status {
            FileStatus::Unchanged => verbosity.is_verbose(),
            FileStatus::Created | FileStatus::Updated => verbosity.should_show_output(),
        };
        if !show {
            continue;
        }

        let verb = if report.dry_run {
            format!("would be {}", outcome.status)
        } else {
            outcome.status.to_string()
        };
        let mark = match outcome.status {
            FileStatus::Unchanged => "=".bright_black(),
            FileStatus::Created | FileStatus::Updated => "✓".green().bold(),
        };

        if verbosity.is_verbose() {
            eprintln!(
                "{} {} ({}, {} lines rewritten, {} setup cells replaced)",
                mark,
                outcome.relative.display().to_string().bright_white(),
                verb,
                outcome.stats.lines_rewritten,
                outcome.stats.setup_cells_removed
            );
        } else {
            eprintln!(
                "{} {} ({})",
                mark,
                outcome.relative.display().to_string().bright_white(),
                verb
            );
        }
    }

    // Failures are printed regardless of verbosity
    for failure in &report.failures {
        eprintln!(
            "{} {} - {}",
            "✗".red().bold(),
            failure.relative.display().to_string().bright_white(),
            failure.error.to_string().red()
        );
    }
}

fn print_summary(report: &RunReport, elapsed_secs: f64) {
    let title = if report.dry_run {
        "=== Colab Preparation Summary (dry run) ==="
    } else {
        "=== Colab Preparation Summary ==="
    };
    let failed = report.failures.len();

    eprintln!("\n{}", title.bold());
    eprintln!("{:<16} {}", "Notebooks:", report.total().to_string().cyan());
    eprintln!(
        "{:<16} {}",
        "Created:",
        report.count(FileStatus::Created).to_string().green()
    );
    eprintln!(
        "{:<16} {}",
        "Updated:",
        report.count(FileStatus::Updated).to_string().green()
    );
    eprintln!(
        "{:<16} {}",
        "Unchanged:",
        report.count(FileStatus::Unchanged).to_string().normal()
    );
    eprintln!(
        "{:<16} {}",
        "Failed:",
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    eprintln!("{:<16} {:.2}s", "Total time:", elapsed_secs);
}
