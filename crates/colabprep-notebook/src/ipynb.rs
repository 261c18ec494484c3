use crate::error::{NotebookError, Result};
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Only nbformat 4.x documents are accepted.
pub const SUPPORTED_MAJOR_VERSION: u32 = 4;

/// Jupyter Notebook document (nbformat 4)
///
/// Top-level keys this crate does not model are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// Cells in document order
    pub cells: Vec<Cell>,
    /// Notebook-level metadata (kernelspec, language_info, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Major format version
    pub nbformat: u32,
    /// Minor format version
    pub nbformat_minor: u32,
    /// Unmodelled top-level keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Individual notebook cell, keyed by its `cell_type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    /// Markdown documentation cell
    Markdown(TextCell),
    /// Executable code cell
    Code(CodeCell),
    /// Raw text cell, passed through untouched
    Raw(TextCell),
}

/// Markdown or raw cell body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    /// Cell identifier (nbformat >= 4.5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Cell metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Cell source lines
    pub source: Source,
    /// Unmodelled keys such as `attachments`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Code cell body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    /// Cell identifier (nbformat >= 4.5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Cell metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Cell source lines
    pub source: Source,
    /// Outputs recorded when the notebook was last run
    #[serde(default)]
    pub outputs: Vec<Value>,
    /// Execution counter, `null` when never run
    #[serde(default)]
    pub execution_count: Option<u64>,
    /// Unmodelled keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Type of notebook cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Executable code cell
    Code,
    /// Markdown documentation cell
    Markdown,
    /// Raw text cell (no formatting)
    Raw,
}

impl std::fmt::Display for CellType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
        };
        write!(f, "{s}")
    }
}

/// Cell source as a sequence of lines
///
/// Each line keeps its trailing `\n` except possibly the last one, the same
/// split Jupyter uses on disk. Both the string and the list form are
/// accepted when reading; the list form is always written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Source(Vec<String>);

impl Source {
    /// Split a block of text into source lines
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self(text.split_inclusive('\n').map(String::from).collect())
    }

    /// Build from already split lines
    #[inline]
    #[must_use]
    pub const fn from_lines(lines: Vec<String>) -> Self {
        Self(lines)
    }

    /// Source lines
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Mutable access to source lines
    #[inline]
    pub fn lines_mut(&mut self) -> &mut [String] {
        &mut self.0
    }

    /// First line without its line terminator
    #[must_use]
    pub fn first_line(&self) -> Option<&str> {
        self.0.first().map(|line| line.trim_end_matches(['\r', '\n']))
    }

    /// Whole source as one string
    #[must_use]
    pub fn text(&self) -> String {
        self.0.concat()
    }

    /// True when the cell has no source
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Lines(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Self::from_text(&text),
            Repr::Lines(lines) => Self(lines),
        })
    }
}

impl Cell {
    /// Type tag of this cell
    #[must_use]
    pub const fn cell_type(&self) -> CellType {
        match self {
            Self::Markdown(_) => CellType::Markdown,
            Self::Code(_) => CellType::Code,
            Self::Raw(_) => CellType::Raw,
        }
    }

    /// Cell identifier, if the document carries one
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Markdown(cell) | Self::Raw(cell) => cell.id.as_deref(),
            Self::Code(cell) => cell.id.as_deref(),
        }
    }

    /// Cell source
    #[must_use]
    pub const fn source(&self) -> &Source {
        match self {
            Self::Markdown(cell) | Self::Raw(cell) => &cell.source,
            Self::Code(cell) => &cell.source,
        }
    }

    /// Cell metadata
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        match self {
            Self::Markdown(cell) | Self::Raw(cell) => &cell.metadata,
            Self::Code(cell) => &cell.metadata,
        }
    }

    /// The code cell body, if this is a code cell
    #[must_use]
    pub const fn as_code(&self) -> Option<&CodeCell> {
        match self {
            Self::Code(cell) => Some(cell),
            _ => None,
        }
    }

    /// Mutable code cell body, if this is a code cell
    pub fn as_code_mut(&mut self) -> Option<&mut CodeCell> {
        match self {
            Self::Code(cell) => Some(cell),
            _ => None,
        }
    }
}

impl Notebook {
    /// Kernel name from `metadata.kernelspec.name` (e.g. "python3")
    #[must_use]
    pub fn kernel_name(&self) -> Option<&str> {
        self.metadata
            .get("kernelspec")
            .and_then(|ks| ks.get("name"))
            .and_then(Value::as_str)
    }

    /// Cell ids are mandatory from nbformat 4.5 on
    #[inline]
    #[must_use]
    pub const fn supports_cell_ids(&self) -> bool {
        self.nbformat > 4 || (self.nbformat == 4 && self.nbformat_minor >= 5)
    }

    /// Iterate mutably over code cells only
    pub fn code_cells_mut(&mut self) -> impl Iterator<Item = &mut CodeCell> {
        self.cells.iter_mut().filter_map(Cell::as_code_mut)
    }

    /// Serialize to the canonical on-disk form
    ///
    /// Keys sorted, one-space indent, trailing newline. Equal documents
    /// always produce equal bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a metadata value cannot be represented as JSON.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        // Round-trip through Value so object keys come out sorted.
        let value = serde_json::to_value(self)?;
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
        value.serialize(&mut serializer)?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Serialize to the canonical on-disk form as a string
    ///
    /// # Errors
    ///
    /// Returns an error if a metadata value cannot be represented as JSON.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        String::from_utf8(self.to_json_bytes()?).map_err(serde_json::Error::custom)
    }
}

/// Parse a Jupyter Notebook from a file path
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (`ReadError`)
/// - The notebook JSON is malformed (`ParseError`)
/// - The document is not nbformat 4 (`UnsupportedVersion`)
pub fn parse_notebook<P: AsRef<Path>>(path: P) -> Result<Notebook> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| NotebookError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_notebook_from_str(&content, path)
}

/// Parse a Jupyter Notebook from a string
///
/// `origin` is only used to label errors.
///
/// # Errors
///
/// Returns an error if the notebook JSON is malformed or not nbformat 4.
pub fn parse_notebook_from_str<P: AsRef<Path>>(content: &str, origin: P) -> Result<Notebook> {
    let origin = origin.as_ref();
    let notebook: Notebook =
        serde_json::from_str(content).map_err(|source| NotebookError::ParseError {
            path: origin.to_path_buf(),
            source,
        })?;

    if notebook.nbformat != SUPPORTED_MAJOR_VERSION {
        return Err(NotebookError::UnsupportedVersion {
            path: origin.to_path_buf(),
            major: notebook.nbformat,
            minor: notebook.nbformat_minor,
        });
    }

    Ok(notebook)
}

/// Write a notebook in canonical form, replacing `path` atomically
///
/// # Errors
///
/// Returns `WriteError` if the destination directory cannot be created or
/// the file cannot be written.
pub fn write_notebook<P: AsRef<Path>>(path: P, notebook: &Notebook) -> Result<()> {
    let path = path.as_ref();
    let bytes = notebook
        .to_json_bytes()
        .map_err(|e| write_error(path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
    write_atomic(path, &bytes)
}

/// Write `bytes` to a temp file beside `path`, then rename it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| write_error(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| write_error(path, e))?;
    tmp.write_all(bytes).map_err(|e| write_error(path, e))?;
    tmp.as_file().sync_all().map_err(|e| write_error(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(|e| write_error(path, e))?;
    }

    tmp.persist(path).map_err(|e| write_error(path, e.error))?;
    Ok(())
}

fn write_error(path: &Path, source: io::Error) -> NotebookError {
    NotebookError::WriteError {
        path: path.to_path_buf(),
        source,
    }
}
