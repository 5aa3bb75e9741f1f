//! rewrite a single attribute of a located block
//!
//! The new value replaces the attribute's value expression inside the parsed document. The expression inherits the
//! decor (whitespace and comments around it) of the value it replaces, everything else in the document is left as
//! parsed. Files are replaced atomically: the new contents are written to a temporary file next to the target which
//! is then renamed over it.
use crate::locator::{BlockHandle, BlockKey};
use crate::snapshot::ProviderSchemaSnapshot;
use crate::value::TypedValue;
use hcl_edit::structure::{Attribute, Body, Structure};
use hcl_edit::{Decor, Decorate, Decorated, Ident};
use std::io::Write;
use std::path::{Path, PathBuf};

const INDENT: &str = "  ";

/// Arguments understood by every resource regardless of its schema
const META_ARGUMENTS: &[&str] = &[
    "count",
    "for_each",
    "provider",
    "depends_on",
    "lifecycle",
    "provisioner",
    "connection",
];

#[derive(thiserror::Error, Debug)]
pub enum EditError {
    #[error("`{0}` is not a valid attribute name")]
    InvalidAttributeName(String),
    #[error("attribute `{attribute}` is not part of the schema of {block}")]
    AttributeNotWritable { block: String, attribute: String },
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Set `name` to `value` in the located block and serialize the whole document
///
/// An attribute that does not exist yet is appended to the block body.
#[tracing::instrument(level = "debug", skip(handle, value), fields(path=%handle.source_file.display()))]
pub fn set_attribute(
    handle: &mut BlockHandle,
    name: &str,
    value: TypedValue,
) -> Result<Vec<u8>, EditError> {
    let key = Ident::try_new(name).map_err(|_| EditError::InvalidAttributeName(name.to_owned()))?;
    let expression = hcl_edit::expr::Expression::from(value);

    handle.with_block_mut(|block| set_in_body(&mut block.body, key, expression));

    Ok(handle.document().to_string().into_bytes())
}

fn set_in_body(body: &mut Body, key: Ident, mut expression: hcl_edit::expr::Expression) {
    let existing = body.iter().position(|structure| {
        matches!(structure, Structure::Attribute(attribute) if attribute.key.value() == &key)
    });

    match existing {
        Some(index) => {
            let Structure::Attribute(mut attribute) = body.remove(index) else {
                unreachable!("index was found for an attribute");
            };

            *expression.decor_mut() = attribute.value.decor().clone();
            attribute.value = expression;
            body.insert(index, attribute);
        }
        None => {
            tracing::debug!(attribute=%key.as_str(), "adding attribute");
            if body.is_empty() || body.prefer_oneline() {
                expand_oneline(body);
            }

            let mut attribute = Attribute::new(Decorated::new(key), expression);
            *attribute.decor_mut() = Decor::new(INDENT, "");
            body.push(attribute);
        }
    }
}

/// Lay out `{}` and `{ a = 1 }` bodies one structure per line
fn expand_oneline(body: &mut Body) {
    body.set_prefer_oneline(false);

    for index in 0..body.len() {
        let mut structure = body.remove(index);
        match &mut structure {
            Structure::Attribute(attribute) => {
                *attribute.decor_mut() = Decor::new(INDENT, "");
                *attribute.value.decor_mut() = Decor::new(" ", "");
            }
            Structure::Block(block) => *block.decor_mut() = Decor::new(INDENT, ""),
        }
        body.insert(index, structure);
    }
}

/// Reject attributes the provider schema does not know for this resource type
///
/// Only `resource` and `data` blocks of a type present in the schema are checked. Meta-arguments are always accepted.
pub fn check_writable(
    schema: &ProviderSchemaSnapshot,
    key: &BlockKey,
    attribute: &str,
) -> Result<(), EditError> {
    if META_ARGUMENTS.contains(&attribute) {
        return Ok(());
    }

    let Some(resource_type) = key.labels.first() else {
        return Ok(());
    };

    let attributes = match key.ident.as_str() {
        "resource" => schema.resource_attributes(resource_type),
        "data" => schema.data_source_attributes(resource_type),
        _ => None,
    };

    match attributes {
        Some(attributes) if !attributes.contains_key(attribute) => {
            Err(EditError::AttributeNotWritable {
                block: key.to_string(),
                attribute: attribute.to_owned(),
            })
        }
        Some(_) => Ok(()),
        None => {
            tracing::debug!(%key, "no schema for block, accepting attribute");
            Ok(())
        }
    }
}

/// Replace the contents of `path`
///
/// The target is either fully replaced or left untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), EditError> {
    let io = |source| EditError::Io {
        path: path.to_owned(),
        source,
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(directory).map_err(io)?;
    file.write_all(contents).map_err(io)?;
    file.as_file().sync_all().map_err(io)?;

    if let Ok(metadata) = std::fs::metadata(path) {
        file.as_file()
            .set_permissions(metadata.permissions())
            .map_err(io)?;
    }

    file.persist(path).map_err(|err| io(err.error))?;

    tracing::info!(path=%path.display(), bytes = contents.len(), "file written");
    Ok(())
}

/// Append `contents` to `path`, creating the file when needed
///
/// Blocks are separated by an empty line.
pub fn append_atomic(path: &Path, contents: &[u8]) -> Result<(), EditError> {
    let mut existing = match std::fs::read(path) {
        Ok(existing) => existing,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(source) => {
            return Err(EditError::Io {
                path: path.to_owned(),
                source,
            })
        }
    };

    if !existing.is_empty() {
        if !existing.ends_with(b"\n") {
            existing.push(b'\n');
        }
        existing.push(b'\n');
    }
    existing.extend_from_slice(contents);

    write_atomic(path, &existing)
}
