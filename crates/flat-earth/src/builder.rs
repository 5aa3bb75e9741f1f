//! create new blocks
//!
//! A new block is built in an empty document and returned as serialized bytes. Writing it to disk is left to the
//! caller, see [target_file] and [crate::editor::append_atomic].
use crate::value::{Tagged, TypeMismatch, TypedValue};
use hcl::{Attribute, Block, BlockLabel, Body, Expression, Identifier};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),
    #[error("attribute `{attribute}`: {source}")]
    TypeMismatch {
        attribute: String,
        #[source]
        source: TypeMismatch,
    },
    #[error("failed to format block: {0}")]
    Format(#[from] hcl::Error),
}

/// Serialize a document containing exactly one block
///
/// Attributes appear in the order given.
#[tracing::instrument(level = "debug", skip(attributes))]
pub fn build(
    ident: &str,
    labels: &[String],
    attributes: &IndexMap<String, Tagged>,
) -> Result<Vec<u8>, BuildError> {
    let mut block = Block::builder(identifier(ident)?);
    for label in labels {
        block = block.add_label(BlockLabel::String(label.clone()));
    }

    for (name, tagged) in attributes {
        let value: TypedValue = tagged.decode().map_err(|source| BuildError::TypeMismatch {
            attribute: name.clone(),
            source,
        })?;
        block = block.add_attribute(Attribute::new(identifier(name)?, Expression::from(value)));
    }

    let document = Body::builder().add_block(block.build()).build();
    let rendered = hcl::format::to_string(&document)?;

    Ok(rendered.into_bytes())
}

fn identifier(name: &str) -> Result<Identifier, BuildError> {
    Identifier::new(name).map_err(|_| BuildError::InvalidIdentifier(name.to_owned()))
}

/// File a new block is written to: `<root>/<name>_<label>.tf`
///
/// Characters other than ASCII alphanumerics, `-` and `_` are replaced so the file always lands directly in `root`.
pub fn target_file(root: &Path, name: &str, label: &str) -> PathBuf {
    let sanitize = |part: &str| -> String {
        part.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    root.join(format!("{}_{}.tf", sanitize(name), sanitize(label)))
}

#[cfg(test)]
mod test {
    use super::*;
    use hcl_edit::structure::Structure;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attributes(entries: serde_json::Value) -> IndexMap<String, Tagged> {
        serde_json::from_value(entries).unwrap()
    }

    #[test]
    fn single_block_with_attributes() {
        let bytes = build(
            "resource",
            &["widget".into(), "b".into()],
            &attributes(json!({"count": {"type": "number", "value": 5}})),
        )
        .unwrap();

        let body = hcl_edit::parser::parse_body(std::str::from_utf8(&bytes).unwrap()).unwrap();
        let structures: Vec<_> = body.iter().collect();
        assert_eq!(structures.len(), 1);

        let Structure::Block(block) = structures[0] else {
            panic!("expected a block");
        };
        assert_eq!(block.ident.value().as_str(), "resource");
        let labels: Vec<_> = block.labels.iter().map(|label| label.as_str()).collect();
        assert_eq!(labels, ["widget", "b"]);

        let parsed: serde_json::Value = hcl::from_str(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, json!({"resource": {"widget": {"b": {"count": 5}}}}));
    }

    #[test]
    fn attribute_order_is_kept() {
        let bytes = build(
            "resource",
            &["widget".into(), "c".into()],
            &attributes(json!({
                "zone": {"type": "string", "value": "b"},
                "active": {"type": "bool", "value": true},
                "tags": {"type": "object", "value": {"team": {"type": "string", "value": "core"}}}
            })),
        )
        .unwrap();
        let rendered = String::from_utf8(bytes).unwrap();

        let zone = rendered.find("zone").unwrap();
        let active = rendered.find("active").unwrap();
        let tags = rendered.find("tags").unwrap();
        assert!(zone < active && active < tags, "{rendered}");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            build("not valid", &[], &IndexMap::new()),
            Err(BuildError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            build(
                "resource",
                &[],
                &attributes(json!({"bad name": {"type": "bool", "value": true}}))
            ),
            Err(BuildError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            build(
                "resource",
                &[],
                &attributes(json!({"count": {"type": "number", "value": "five"}}))
            ),
            Err(BuildError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn target_file_stays_in_root() {
        let root = Path::new("/config");
        assert_eq!(
            target_file(root, "widget", "b"),
            PathBuf::from("/config/widget_b.tf")
        );
        assert_eq!(
            target_file(root, "../etc", "pass/wd"),
            PathBuf::from("/config/___etc_pass_wd.tf")
        );
    }
}
