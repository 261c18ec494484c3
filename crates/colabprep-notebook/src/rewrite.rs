//! In-memory Colab adaptation of a single notebook
//!
//! [`ColabRewriter`] applies three passes to a parsed [`Notebook`]:
//!
//! 1. drop any setup cell left by a previous run and insert a fresh one at
//!    index 0 (replace, never duplicate)
//! 2. rewrite quoted relative asset paths in code cells to remote URLs
//! 3. optionally clear outputs and execution counters
//!
//! Markdown and raw cells are never modified.

use crate::error::{NotebookError, Result};
use crate::ipynb::{Cell, CodeCell, Notebook, Source};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// First line of every generated setup cell
pub const SETUP_MARKER: &str = "# colab-setup: generated by prepare_notebooks_for_colab";

/// Cell id and metadata tag of the generated setup cell
pub const SETUP_CELL_ID: &str = "colab-setup";

/// Remote root that asset directories are served from
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/albumentations-team/albumentations_examples/colab";

/// Packages installed by the setup cell unless configured otherwise
pub const DEFAULT_PACKAGES: &[&str] = &["albumentations"];

/// Directory names whose relative references get rewritten
pub const DEFAULT_ASSET_DIRS: &[&str] = &["images"];

// Package specs end up on a `!pip install` shell line.
static PACKAGE_SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-\[\],<>=!~]*$").expect("Invalid package spec regex")
});

static ASSET_DIR_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._\-]*(/[A-Za-z0-9_][A-Za-z0-9._\-]*)*$")
        .expect("Invalid asset dir regex")
});

/// Which passes to run and with what parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Insert (or replace) the setup cell
    pub setup_cell: bool,
    /// Packages passed to `pip install -q -U`
    pub packages: Vec<String>,
    /// Extra lines appended to the setup cell verbatim
    pub setup_commands: Vec<String>,
    /// Rewrite relative asset paths in code cells
    pub rewrite_paths: bool,
    /// Remote root that replaces the relative prefix
    pub base_url: String,
    /// Directory names treated as assets
    pub asset_dirs: Vec<String>,
    /// Empty outputs and reset execution counters on code cells
    pub clear_outputs: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            setup_cell: true,
            packages: DEFAULT_PACKAGES.iter().map(|p| (*p).to_string()).collect(),
            setup_commands: Vec::new(),
            rewrite_paths: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            asset_dirs: DEFAULT_ASSET_DIRS.iter().map(|d| (*d).to_string()).collect(),
            clear_outputs: false,
        }
    }
}

/// What a single [`ColabRewriter::apply`] call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RewriteStats {
    /// Setup cells from a previous run that were dropped
    pub setup_cells_removed: usize,
    /// Whether a fresh setup cell was inserted at index 0
    pub setup_cell_inserted: bool,
    /// Source lines whose asset references were rewritten
    pub lines_rewritten: usize,
    /// Code cells whose outputs or counter were cleared
    pub outputs_cleared: usize,
}

/// Applies the Colab passes to notebooks
#[derive(Debug, Clone)]
pub struct ColabRewriter {
    options: RewriteOptions,
    base_url: String,
    asset_pattern: Option<Regex>,
}

impl ColabRewriter {
    /// Validate options and compile the asset pattern
    ///
    /// # Errors
    ///
    /// Returns `InvalidOption` for a package spec that is not a plain pip
    /// requirement, an asset directory name with unexpected characters, or
    /// an empty base URL while path rewriting is enabled.
    pub fn new(options: RewriteOptions) -> Result<Self> {
        if let Some(bad) = options.packages.iter().find(|p| !PACKAGE_SPEC.is_match(p)) {
            return Err(NotebookError::InvalidOption(format!(
                "package spec '{bad}' is not a plain pip requirement"
            )));
        }

        let base_url = options.base_url.trim().trim_end_matches('/').to_string();
        let asset_pattern = if options.rewrite_paths && !options.asset_dirs.is_empty() {
            if base_url.is_empty() {
                return Err(NotebookError::InvalidOption(
                    "base URL must not be empty when rewriting asset paths".to_string(),
                ));
            }
            Some(build_asset_pattern(&options.asset_dirs)?)
        } else {
            None
        };

        Ok(Self {
            options,
            base_url,
            asset_pattern,
        })
    }

    /// Run all enabled passes over `notebook`
    pub fn apply(&self, notebook: &mut Notebook) -> RewriteStats {
        let mut stats = RewriteStats::default();

        if self.options.setup_cell {
            let before = notebook.cells.len();
            notebook.cells.retain(|cell| !is_setup_cell(cell));
            stats.setup_cells_removed = before - notebook.cells.len();
        }

        if self.asset_pattern.is_some() {
            for cell in notebook.code_cells_mut() {
                for line in cell.source.lines_mut() {
                    let rewritten = match self.rewrite_line(line) {
                        Cow::Owned(rewritten) => Some(rewritten),
                        Cow::Borrowed(_) => None,
                    };
                    if let Some(rewritten) = rewritten {
                        *line = rewritten;
                        stats.lines_rewritten += 1;
                    }
                }
            }
        }

        if self.options.clear_outputs {
            for cell in notebook.code_cells_mut() {
                if !cell.outputs.is_empty() || cell.execution_count.is_some() {
                    cell.outputs.clear();
                    cell.execution_count = None;
                    stats.outputs_cleared += 1;
                }
            }
        }

        if self.options.setup_cell {
            let cell = self.setup_cell(notebook.supports_cell_ids());
            notebook.cells.insert(0, cell);
            stats.setup_cell_inserted = true;
        }

        stats
    }

    /// Rewrite asset references in one source line
    ///
    /// Returns `Cow::Borrowed` when nothing matched.
    #[must_use]
    pub fn rewrite_line<'a>(&self, line: &'a str) -> Cow<'a, str> {
        match &self.asset_pattern {
            Some(pattern) => pattern.replace_all(line, |caps: &Captures<'_>| {
                format!("{}{}/{}/", &caps["quote"], self.base_url, &caps["dir"])
            }),
            None => Cow::Borrowed(line),
        }
    }

    /// Build the setup cell for a document
    #[must_use]
    pub fn setup_cell(&self, with_id: bool) -> Cell {
        let mut lines = vec![SETUP_MARKER.to_string()];
        lines.extend(
            self.options
                .packages
                .iter()
                .map(|package| format!("!pip install -q -U {package}")),
        );
        lines.extend(self.options.setup_commands.iter().cloned());

        let mut metadata = Map::new();
        metadata.insert(
            "tags".to_string(),
            Value::Array(vec![Value::from(SETUP_CELL_ID)]),
        );

        Cell::Code(CodeCell {
            id: with_id.then(|| SETUP_CELL_ID.to_string()),
            metadata,
            source: Source::from_text(&lines.join("\n")),
            outputs: Vec::new(),
            execution_count: None,
            extra: Map::new(),
        })
    }
}

/// True for a code cell produced by a previous run
///
/// Recognised by the marker line or by the `colab-setup` metadata tag.
#[must_use]
pub fn is_setup_cell(cell: &Cell) -> bool {
    let Cell::Code(code) = cell else {
        return false;
    };

    if code.source.first_line().map(str::trim_end) == Some(SETUP_MARKER) {
        return true;
    }

    code.metadata
        .get("tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(SETUP_CELL_ID)))
}

/// `"./images/` style prefixes: a quote, any run of `./` or `../`, then an
/// asset directory and a slash.
fn build_asset_pattern(asset_dirs: &[String]) -> Result<Regex> {
    if let Some(bad) = asset_dirs.iter().find(|d| !ASSET_DIR_NAME.is_match(d)) {
        return Err(NotebookError::InvalidOption(format!(
            "asset directory '{bad}' must be a relative directory name"
        )));
    }

    let alternatives = asset_dirs
        .iter()
        .map(|dir| regex::escape(dir))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r#"(?P<quote>["'])(?:\.{{1,2}}/)*(?P<dir>{alternatives})/"#);

    Regex::new(&pattern)
        .map_err(|e| NotebookError::InvalidOption(format!("asset pattern does not compile: {e}")))
}
