//! find the file that declares a block
//!
//! A block is identified by its identifier and its complete, ordered list of labels ([BlockKey]). Only root blocks are
//! considered. Files are searched in the order given by [ConfigRoot::files] and the search ends at the first match.
//! When several files declare the same block, the one found first wins.
use crate::hcl_documents::{self, ConfigRoot, LoadError};
use hcl_edit::structure::{Block, Body, Structure};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct BlockKey {
    pub ident: String,
    pub labels: Vec<String>,
}

impl BlockKey {
    /// Exact match on identifier and labels, including label order and count
    pub fn matches(&self, block: &Block) -> bool {
        block.ident.value().as_str() == self.ident
            && block.labels.len() == self.labels.len()
            && block
                .labels
                .iter()
                .zip(&self.labels)
                .all(|(label, expected)| label.as_str() == expected)
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.ident)?;
        for label in &self.labels {
            write!(f, " {label:?}")?;
        }
        Ok(())
    }
}

/// A located block and the document it lives in
///
/// The document is a private copy read from disk for one request.
#[derive(Debug)]
pub struct BlockHandle {
    pub source_file: PathBuf,
    document: Body,
    block_index: usize,
}

impl BlockHandle {
    pub fn document(&self) -> &Body {
        &self.document
    }

    pub fn block(&self) -> &Block {
        match self.document.iter().nth(self.block_index) {
            Some(Structure::Block(block)) => block,
            _ => unreachable!("block handle must point at a block"),
        }
    }

    /// Mutate the located block in place
    ///
    /// The block keeps its position in the document.
    pub fn with_block_mut<R>(&mut self, f: impl FnOnce(&mut Block) -> R) -> R {
        let Structure::Block(mut block) = self.document.remove(self.block_index) else {
            unreachable!("block handle must point at a block");
        };

        let result = f(&mut block);
        self.document.insert(self.block_index, block);
        result
    }
}

/// Search all configuration files below `root` for the block identified by `key`
///
/// Files that can't be read or parsed are logged and skipped. `Ok(None)` means no file declares the block.
#[tracing::instrument(level = "debug", skip_all, fields(root=%root.path.display(), %key))]
pub fn find(root: &ConfigRoot, key: &BlockKey) -> Result<Option<BlockHandle>, LoadError> {
    for file_path in root.files()? {
        match find_in_file(&file_path, key) {
            Ok(Some(handle)) => {
                tracing::debug!(path=%file_path.display(), "block found");
                return Ok(Some(handle));
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(path=%file_path.display(), error=%err, "skipping file");
            }
        }
    }

    tracing::debug!("block not found");
    Ok(None)
}

/// Look for the block identified by `key` in a single file
pub fn find_in_file(file_path: &Path, key: &BlockKey) -> Result<Option<BlockHandle>, LoadError> {
    let (_, document) = hcl_documents::parse_file(file_path)?;

    let block_index = document
        .iter()
        .position(|structure| matches!(structure, Structure::Block(block) if key.matches(block)));

    Ok(block_index.map(|block_index| BlockHandle {
        source_file: file_path.to_owned(),
        document,
        block_index,
    }))
}
