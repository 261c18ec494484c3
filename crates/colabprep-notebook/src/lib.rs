//! # colabprep-notebook
//!
//! Jupyter Notebook (.ipynb) model and the passes that make tutorial
//! notebooks self-contained for Google Colab.
//!
//! This crate provides:
//! - A lossless nbformat 4 document model ([`Notebook`], [`Cell`])
//!   with canonical, deterministic serialization
//! - [`ColabRewriter`]: setup-cell insertion, asset path rewriting and
//!   optional output clearing for one notebook
//! - [`NotebookColabAdapter`]: the same passes over a whole directory tree,
//!   mirrored into an output directory
//!
//! ## Example
//!
//! ```no_run
//! use colabprep_notebook::{parse_notebook, ColabRewriter, RewriteOptions};
//!
//! let mut notebook = parse_notebook("notebooks/example.ipynb")?;
//! let rewriter = ColabRewriter::new(RewriteOptions::default())?;
//! let stats = rewriter.apply(&mut notebook);
//! println!("rewrote {} lines", stats.lines_rewritten);
//! # Ok::<(), colabprep_notebook::NotebookError>(())
//! ```

/// Directory-level adaptation
pub mod adapter;
/// Error types for notebook adaptation
pub mod error;
/// Jupyter notebook (ipynb) model
pub mod ipynb;
/// Per-notebook rewrite passes
pub mod rewrite;

pub use adapter::{
    FileFailure, FileOutcome, FileStatus, NotebookColabAdapter, RunOptions, RunReport,
};
pub use error::{NotebookError, Result};
pub use ipynb::{
    parse_notebook, parse_notebook_from_str, write_notebook, Cell, CellType, CodeCell, Notebook,
    Source, TextCell,
};
pub use rewrite::{
    is_setup_cell, ColabRewriter, RewriteOptions, RewriteStats, DEFAULT_ASSET_DIRS,
    DEFAULT_BASE_URL, DEFAULT_PACKAGES, SETUP_CELL_ID, SETUP_MARKER,
};
