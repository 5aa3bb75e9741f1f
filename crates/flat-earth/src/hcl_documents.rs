//! configuration files and the documents parsed from them
//!
//! [ConfigRoot] describes which files belong to a configuration: every file below the root directory whose extension
//! is accepted. Hidden directories (`.terraform`, `.git`, ...) are not entered. Files are visited in lexical path order
//! so that every lookup over an unchanged directory visits files in the same order.
//!
//! [HclDocuments] tracks
//! - the source path and text of each loaded file
//! - the root blocks
//! and defines a numeric index for each. Once added those indices are stable (removal is not possible)
use hcl_edit::structure::{Block, Body, Structure};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Root directory of a configuration and the file extensions that make up the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRoot {
    pub path: PathBuf,
    pub extensions: Vec<String>,
}

impl ConfigRoot {
    pub const DEFAULT_EXTENSION: &'static str = "tf";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extensions: vec![Self::DEFAULT_EXTENSION.to_owned()],
        }
    }

    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = String>) -> Self {
        self.extensions = extensions.into_iter().collect();
        self
    }

    pub fn is_config_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|accepted| accepted == ext))
    }

    /// All configuration files in walk order
    ///
    /// Fails only when the root itself cannot be read. Unreadable entries below the root are logged and skipped.
    pub fn files(&self) -> Result<impl Iterator<Item = PathBuf> + '_, LoadError> {
        let metadata = std::fs::metadata(&self.path)?;
        if !metadata.is_dir() {
            return Err(LoadError::NotADirectory(self.path.clone()));
        }

        let walk = walkdir::WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error=%err, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.is_config_file(entry.path()))
            .map(walkdir::DirEntry::into_path);

        Ok(walk)
    }
}

fn is_hidden(file_name: &std::ffi::OsStr) -> bool {
    file_name.to_string_lossy().starts_with('.')
}

/// Read and parse a single file
pub fn parse_file(path: &Path) -> Result<(String, Body), LoadError> {
    let contents = std::fs::read_to_string(path)?;
    let body = hcl_edit::parser::parse_body(&contents)?;
    Ok((contents, body))
}

/// A loaded file
#[derive(Debug, Clone)]
pub struct Source {
    pub path: Option<PathBuf>,
    pub contents: String,
}

impl Source {
    pub fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    }

    /// Line and column (both 1-based) of a byte offset
    pub fn position(&self, byte: usize) -> Pos {
        let byte = byte.min(self.contents.len());
        let before = self.contents.get(..byte).unwrap_or_default();
        let line_start = before.rfind('\n').map_or(0, |newline| newline + 1);

        Pos {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
            byte,
        }
    }

    pub fn range(&self, span: Range<usize>) -> SourceRange {
        SourceRange {
            filename: self.display_path(),
            start: self.position(span.start),
            end: self.position(span.end),
        }
    }

    /// Source text covered by `span`
    pub fn text(&self, span: Range<usize>) -> Option<&str> {
        self.contents.get(span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceRange {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

#[derive(Default, Debug)]
pub struct HclDocuments {
    sources: Vec<Source>,
    root_blocks: Vec<(usize, Block)>,
}

impl HclDocuments {
    /// Inserts and indexes an hcl document
    ///
    /// Root attributes carry no resources and are dropped.
    pub fn insert(&mut self, document: Body, source: Source) {
        let source_index = self.sources.len();
        self.sources.push(source);

        for structure in document.into_iter() {
            if let Structure::Block(block) = structure {
                self.root_blocks.push((source_index, block));
            }
        }
    }

    pub fn get_block(&self, index: usize) -> SourceBlock<'_> {
        let (source_index, block) = &self.root_blocks[index];
        (index, &self.sources[*source_index], block)
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock<'_>> {
        self.root_blocks
            .iter()
            .enumerate()
            .map(|(index, (source_index, block))| (index, &self.sources[*source_index], block))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl HclDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        tracing::debug!(path=%file_path.display(), "loading file");

        let (contents, body) = parse_file(file_path)?;
        self.insert(
            body,
            Source {
                path: Some(file_path.to_owned()),
                contents,
            },
        );
        Ok(())
    }

    /// Load every configuration file below `root`
    ///
    /// Files that fail to load are logged and skipped. Only a root that cannot be read is an error.
    pub fn load_directory(&mut self, root: &ConfigRoot) -> Result<(), LoadError> {
        for file_path in root.files()? {
            if let Err(err) = self.load_file(&file_path) {
                tracing::warn!(path=%file_path.display(), error=%err, "skipping file");
            }
        }

        tracing::info!(root=%root.path.display(), files = self.source_count(), "configuration loaded");
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl file: {0}")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
}

/// Utility macro to create [HclDocuments]
///
/// Create from a single document
/// ```
/// # use flat_earth::hcl_documents;
/// hcl_documents!(r#"resource "widget" "a" {}"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use flat_earth::hcl_documents;
/// hcl_documents! {
///   "one.tf" => r#"resource "widget" "a" {}"#,
///   "two.tf" => r#"resource "widget" "b" {}"#
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use flat_earth::hcl_documents;
/// hcl_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! hcl_documents {
    // single document without source
    { $expr:expr } => {
        {
            let mut docs = $crate::hcl_documents::HclDocuments::default();
            docs.insert(
                hcl_edit::parser::parse_body($expr).expect("body must parse"),
                $crate::hcl_documents::Source { path: None, contents: $expr.to_string() },
            );
            docs
        }
    };
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {
        {
            let mut docs = $crate::hcl_documents::HclDocuments::default();
            $(
                docs.insert(
                    hcl_edit::parser::parse_body($expr).expect("body must parse"),
                    $crate::hcl_documents::Source { path: Some($source.into()), contents: $expr.to_string() },
                );
            )+
            docs
        }
    };
}

pub type SourceBlock<'a> = (usize, &'a Source, &'a Block);
