//! Directory-level adaptation: mirror every notebook under an input
//! directory into an output directory, rewritten for Colab.

use crate::error::{NotebookError, Result};
use crate::ipynb::{parse_notebook, write_atomic};
use crate::rewrite::{ColabRewriter, RewriteOptions, RewriteStats};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Notebook file extension
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Jupyter autosave directories never get published
const CHECKPOINT_DIR: &str = ".ipynb_checkpoints";

/// Per-run switches that do not affect the produced bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RunOptions {
    /// Compute outcomes without writing anything
    pub dry_run: bool,
    /// Stop at the first failing file
    pub fail_fast: bool,
}

/// What happened to one output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Output did not exist before
    Created,
    /// Output existed with different content
    Updated,
    /// Output already held exactly these bytes
    Unchanged,
}

impl std::fmt::Display for FileStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

/// Result of adapting one notebook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Path relative to both the input and output directory
    pub relative: PathBuf,
    /// Whether the output was created, updated or left alone
    pub status: FileStatus,
    /// Changes the rewriter made
    pub stats: RewriteStats,
}

/// A notebook that could not be adapted
#[derive(Debug)]
pub struct FileFailure {
    /// Path relative to the input directory
    pub relative: PathBuf,
    /// Why it failed
    pub error: NotebookError,
}

/// Summary of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Successfully processed notebooks, in traversal order
    pub outcomes: Vec<FileOutcome>,
    /// Notebooks that failed, in traversal order
    pub failures: Vec<FileFailure>,
    /// Set when nothing was written
    pub dry_run: bool,
}

impl RunReport {
    /// True when no file failed
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of notebooks seen (processed or failed)
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len() + self.failures.len()
    }

    /// Number of outcomes with the given status
    #[must_use]
    pub fn count(&self, status: FileStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Number of outputs that were (or in a dry run would be) written
    #[must_use]
    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status != FileStatus::Unchanged)
            .count()
    }
}

/// Mirrors a notebook tree into an output tree, adapted for Colab
///
/// # Example
///
/// ```no_run
/// use colabprep_notebook::{NotebookColabAdapter, RewriteOptions, RunOptions};
///
/// let adapter = NotebookColabAdapter::new(RewriteOptions::default())?;
/// let report = adapter.run("notebooks", "colab", RunOptions::default())?;
/// for failure in &report.failures {
///     eprintln!("{}: {}", failure.relative.display(), failure.error);
/// }
/// # Ok::<(), colabprep_notebook::NotebookError>(())
/// ```
#[derive(Debug, Clone)]
pub struct NotebookColabAdapter {
    rewriter: ColabRewriter,
}

impl NotebookColabAdapter {
    /// Create an adapter from rewrite options
    ///
    /// # Errors
    ///
    /// Returns `InvalidOption` if the options are rejected by
    /// [`ColabRewriter::new`].
    pub fn new(options: RewriteOptions) -> Result<Self> {
        Ok(Self {
            rewriter: ColabRewriter::new(options)?,
        })
    }

    /// List notebooks under `input_dir`, relative to it, sorted by name
    ///
    /// `.ipynb_checkpoints` directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns `InputNotFound` if `input_dir` is not a directory and
    /// `WalkError` if a subdirectory cannot be read.
    pub fn discover<P: AsRef<Path>>(&self, input_dir: P) -> Result<Vec<PathBuf>> {
        let input_dir = input_dir.as_ref();
        if !input_dir.is_dir() {
            return Err(NotebookError::InputNotFound {
                path: input_dir.to_path_buf(),
            });
        }

        let walker = WalkDir::new(input_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && entry.file_name() == CHECKPOINT_DIR)
            });

        let mut notebooks = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| NotebookError::WalkError {
                path: input_dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !is_notebook(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(input_dir) {
                notebooks.push(relative.to_path_buf());
            }
        }

        Ok(notebooks)
    }

    /// Adapt `input_dir/relative` into `output_dir/relative`
    ///
    /// The input is fully parsed and rewritten before anything is written,
    /// and the output replaces any previous file atomically. An output that
    /// already holds the same bytes is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ReadError`, `ParseError` or `UnsupportedVersion` for a bad
    /// input and `WriteError` if the output cannot be written.
    pub fn adapt_file(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        relative: &Path,
        dry_run: bool,
    ) -> Result<FileOutcome> {
        let source_path = input_dir.join(relative);
        let dest_path = output_dir.join(relative);

        let mut notebook = parse_notebook(&source_path)?;
        let stats = self.rewriter.apply(&mut notebook);
        let bytes = notebook
            .to_json_bytes()
            .map_err(|e| NotebookError::WriteError {
                path: dest_path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?;

        let status = match fs::read(&dest_path) {
            Ok(existing) if existing == bytes => FileStatus::Unchanged,
            Ok(_) => FileStatus::Updated,
            Err(e) if e.kind() == io::ErrorKind::NotFound => FileStatus::Created,
            Err(source) => {
                return Err(NotebookError::WriteError {
                    path: dest_path,
                    source,
                })
            }
        };

        if !dry_run && status != FileStatus::Unchanged {
            write_atomic(&dest_path, &bytes)?;
        }

        debug!(
            "{} -> {} ({status}, kernel {}, {} lines rewritten)",
            source_path.display(),
            dest_path.display(),
            notebook.kernel_name().unwrap_or("unknown"),
            stats.lines_rewritten
        );

        Ok(FileOutcome {
            relative: relative.to_path_buf(),
            status,
            stats,
        })
    }

    /// Adapt every notebook under `input_dir` into `output_dir`
    ///
    /// Each file is attempted and failures are collected in the report,
    /// unless `options.fail_fast` is set. When `output_dir` lies inside
    /// `input_dir`, notebooks already under `output_dir` are not treated as
    /// inputs.
    ///
    /// # Errors
    ///
    /// Returns `InputNotFound` or `WalkError` when the input tree cannot be
    /// listed. Per-file errors go to [`RunReport::failures`].
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Q,
        options: RunOptions,
    ) -> Result<RunReport> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();

        let notebooks = self.discover(input_dir)?;
        info!(
            "Found {} notebooks under {}",
            notebooks.len(),
            input_dir.display()
        );

        let mut report = RunReport {
            dry_run: options.dry_run,
            ..RunReport::default()
        };

        let nested_output = nested_output_prefix(input_dir, output_dir);

        for relative in notebooks {
            if let Some(prefix) = &nested_output {
                if relative.starts_with(prefix) {
                    debug!("Skipping {} inside the output directory", relative.display());
                    continue;
                }
            }

            match self.adapt_file(input_dir, output_dir, &relative, options.dry_run) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(error) => {
                    warn!("{error}");
                    report.failures.push(FileFailure { relative, error });
                    if options.fail_fast {
                        break;
                    }
                }
            }
        }

        info!(
            "Adapted {} notebooks ({} changed, {} failed)",
            report.outcomes.len(),
            report.changed(),
            report.failures.len()
        );

        Ok(report)
    }
}

/// Location of `output_dir` relative to `input_dir`, when it lies inside it
///
/// Both paths are canonicalized, so `.`/`..` segments, relative vs absolute
/// spellings and symlinks all resolve to the same answer. An output
/// directory that does not exist yet cannot hold any notebooks.
fn nested_output_prefix(input_dir: &Path, output_dir: &Path) -> Option<PathBuf> {
    let input = fs::canonicalize(input_dir).ok()?;
    let output = fs::canonicalize(output_dir).ok()?;
    output.strip_prefix(&input).ok().map(Path::to_path_buf)
}

fn is_notebook(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(NOTEBOOK_EXTENSION))
}
