//! JSON projections of the resource graph and of the provider schemas
use crate::hcl_documents::{ConfigRoot, Source, SourceRange};
use crate::toolchain::{
    Mode, ProviderSchemas, Resource, ResourceGraph, Schema, SchemaAttribute, SchemaBlock, Toolchain,
    ToolchainError,
};
use hcl::eval::Evaluate;
use hcl_edit::structure::{Body, Structure};
use hcl_edit::Span;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeSet;

/// Resources keyed by address, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphSnapshot {
    pub resources: IndexMap<String, ResourceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub mode: Mode,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decl_range: Option<SourceRange>,
    pub attributes: IndexMap<String, AttributeDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockDescriptor>,
    pub references: BTreeSet<String>,
    pub depends_on: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Source text of the value expression
    pub expression: String,
    /// Value of constant expressions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
}

/// A block nested in a resource, e.g. `lifecycle`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub attributes: IndexMap<String, AttributeDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockDescriptor>,
}

/// Attribute schemas keyed by provider source address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSchemaSnapshot {
    pub providers: IndexMap<String, ProviderSnapshot>,
}

pub type AttributeKinds = IndexMap<String, AttributeKind>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    #[serde(default)]
    pub resources: IndexMap<String, AttributeKinds>,
    #[serde(default)]
    pub data_sources: IndexMap<String, AttributeKinds>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeKind {
    /// Rendered type such as `string` or `list(string)`, `block` for nested blocks
    #[serde(rename = "type")]
    pub kind: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
}

impl ProviderSchemaSnapshot {
    pub fn resource_attributes(&self, type_name: &str) -> Option<&AttributeKinds> {
        self.providers
            .values()
            .find_map(|provider| provider.resources.get(type_name))
    }

    pub fn data_source_attributes(&self, type_name: &str) -> Option<&AttributeKinds> {
        self.providers
            .values()
            .find_map(|provider| provider.data_sources.get(type_name))
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(root=%root.path.display()))]
pub fn snapshot_graph(
    toolchain: &dyn Toolchain,
    root: &ConfigRoot,
) -> Result<GraphSnapshot, ToolchainError> {
    let graph = toolchain.load_graph(root)?;

    let resources = graph
        .resources
        .iter()
        .map(|(address, resource)| (address.clone(), describe_resource(&graph, resource)))
        .collect();

    Ok(GraphSnapshot { resources })
}

#[tracing::instrument(level = "debug", skip_all, fields(root=%root.path.display()))]
pub fn snapshot_schema(
    toolchain: &dyn Toolchain,
    root: &ConfigRoot,
) -> Result<ProviderSchemaSnapshot, ToolchainError> {
    Ok(ProviderSchemaSnapshot::from(toolchain.provider_schemas(root)?))
}

fn describe_resource(graph: &ResourceGraph, resource: &Resource) -> ResourceDescriptor {
    let (source, block) = graph.declaration(resource);
    let (attributes, blocks) = describe_body(source, &block.body);

    ResourceDescriptor {
        mode: resource.mode,
        type_name: resource.type_name.clone(),
        name: resource.name.clone(),
        provider: resource.provider.clone(),
        decl_range: block.span().map(|span| source.range(span)),
        attributes,
        blocks,
        references: resource.references.clone(),
        depends_on: resource.dependencies.clone(),
    }
}

fn describe_body(
    source: &Source,
    body: &Body,
) -> (IndexMap<String, AttributeDescriptor>, Vec<BlockDescriptor>) {
    let mut attributes = IndexMap::new();
    let mut blocks = Vec::new();

    for structure in body.iter() {
        match structure {
            Structure::Attribute(attribute) => {
                attributes.insert(
                    attribute.key.value().as_str().to_owned(),
                    describe_expression(source, &attribute.value),
                );
            }
            Structure::Block(block) => {
                let (attributes, nested) = describe_body(source, &block.body);
                blocks.push(BlockDescriptor {
                    block_type: block.ident.value().as_str().to_owned(),
                    labels: block.labels.iter().map(|label| label.as_str().to_owned()).collect(),
                    attributes,
                    blocks: nested,
                });
            }
        }
    }

    (attributes, blocks)
}

fn describe_expression(source: &Source, expr: &hcl_edit::expr::Expression) -> AttributeDescriptor {
    let converted = hcl::Expression::from(expr.clone());

    let expression = expr
        .span()
        .and_then(|span| source.text(span))
        .map(|text| text.trim().to_owned())
        .or_else(|| hcl::format::to_string(&converted).ok())
        .unwrap_or_default();

    // only constants evaluate without variables and functions
    let value = converted
        .evaluate(&hcl::eval::Context::new())
        .ok()
        .and_then(|value| serde_json::to_value(value).ok());

    AttributeDescriptor { expression, value }
}

impl From<ProviderSchemas> for ProviderSchemaSnapshot {
    fn from(schemas: ProviderSchemas) -> Self {
        let providers = schemas
            .provider_schemas
            .into_iter()
            .map(|(address, provider)| {
                let flatten = |schemas: IndexMap<String, Schema>| -> IndexMap<String, AttributeKinds> {
                    schemas
                        .into_iter()
                        .map(|(type_name, schema)| (type_name, attribute_kinds(&schema.block)))
                        .collect()
                };

                let snapshot = ProviderSnapshot {
                    resources: flatten(provider.resource_schemas),
                    data_sources: flatten(provider.data_source_schemas),
                };
                (address, snapshot)
            })
            .collect();

        Self { providers }
    }
}

fn attribute_kinds(block: &SchemaBlock) -> AttributeKinds {
    let attributes = block
        .attributes
        .iter()
        .map(|(name, attribute)| (name.clone(), attribute_kind(attribute)));

    let block_types = block.block_types.iter().map(|(name, block_type)| {
        let kind = AttributeKind {
            kind: "block".to_owned(),
            required: block_type.min_items > 0,
            optional: block_type.min_items == 0,
            computed: false,
            sensitive: false,
        };
        (name.clone(), kind)
    });

    attributes.chain(block_types).collect()
}

fn attribute_kind(attribute: &SchemaAttribute) -> AttributeKind {
    let kind = match (&attribute.attribute_type, &attribute.nested_type) {
        (Some(cty), _) => render_type(cty),
        (None, Some(_)) => "nested".to_owned(),
        (None, None) => "dynamic".to_owned(),
    };

    AttributeKind {
        kind,
        required: attribute.required,
        optional: attribute.optional,
        computed: attribute.computed,
        sensitive: attribute.sensitive,
    }
}

/// `["map", ["list", "string"]]` renders as `map(list(string))`
fn render_type(cty: &Json) -> String {
    let Json::Array(parts) = cty else {
        return match cty {
            Json::String(name) => name.clone(),
            other => other.to_string(),
        };
    };

    match parts.as_slice() {
        [Json::String(kind), Json::Object(fields)] => {
            let fields: Vec<_> = fields
                .iter()
                .map(|(name, field)| format!("{name}={}", render_type(field)))
                .collect();
            format!("{kind}({{{}}})", fields.join(", "))
        }
        [Json::String(kind), Json::Array(elements)] => {
            let elements: Vec<_> = elements.iter().map(render_type).collect();
            format!("{kind}([{}])", elements.join(", "))
        }
        [Json::String(kind), element] => format!("{kind}({})", render_type(element)),
        _ => cty.to_string(),
    }
}
