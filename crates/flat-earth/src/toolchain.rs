//! turn a configuration root into a resource graph and provider schemas
//!
//! [Toolchain] is the seam between the service and whatever understands the configuration language. [HclToolchain]
//! is the implementation used by the binary:
//!
//! - every configuration file below the root is parsed, files that fail to parse are skipped
//! - `resource "<type>" "<name>"` and `data "<type>" "<name>"` blocks become graph nodes
//! - each node refers to whatever its expressions reference (see [crate::util::ReferenceCollector])
//! - references to other nodes become dependency edges
//!
//! Provider schemas are what `terraform providers schema -json` prints, either read from a file or produced by running
//! a command inside the configuration root.
use crate::hcl_documents::{ConfigRoot, HclDocuments, LoadError, Source};
use crate::util::{traversal_path, ReferenceCollector};
use hcl_edit::structure::Block;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

pub trait Toolchain: Send + Sync {
    /// Best-effort graph of all resources in the configuration
    fn load_graph(&self, root: &ConfigRoot) -> Result<ResourceGraph, ToolchainError>;

    fn provider_schemas(&self, root: &ConfigRoot) -> Result<ProviderSchemas, ToolchainError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ToolchainError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] LoadError),
    #[error("failed to read provider schemas from {}: {source}", path.display())]
    SchemaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no command configured to load provider schemas")]
    EmptySchemaCommand,
    #[error("failed to run `{program}`: {source}")]
    SchemaCommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` failed ({status}): {stderr}")]
    SchemaCommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("malformed provider schemas: {0}")]
    SchemaDecode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Managed,
    Data,
}

impl Mode {
    fn of(block: &Block) -> Option<Self> {
        match block.ident.value().as_str() {
            "resource" => Some(Mode::Managed),
            "data" => Some(Mode::Data),
            _ => None,
        }
    }

    pub fn address(&self, type_name: &str, name: &str) -> String {
        match self {
            Mode::Managed => format!("{type_name}.{name}"),
            Mode::Data => format!("data.{type_name}.{name}"),
        }
    }
}

/// A `resource` or `data` block
#[derive(Debug, Clone)]
pub struct Resource {
    pub mode: Mode,
    pub type_name: String,
    pub name: String,
    /// Explicit `provider` reference or the provider implied by the type name
    pub provider: String,
    /// Everything referenced by the resource's expressions
    pub references: BTreeSet<String>,
    /// References to other resources of the graph
    pub dependencies: BTreeSet<String>,
    /// Index into [ResourceGraph::documents]
    block_index: usize,
}

#[derive(Debug, Default)]
pub struct ResourceGraph {
    pub documents: HclDocuments,
    /// Keyed by address, in declaration order
    pub resources: IndexMap<String, Resource>,
}

impl ResourceGraph {
    /// The declaring block of `resource` and the file it was loaded from
    pub fn declaration(&self, resource: &Resource) -> (&Source, &Block) {
        declaration(&self.documents, resource)
    }
}

/// Where provider schemas come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// Output of `terraform providers schema -json` saved to a file
    File(PathBuf),
    /// Command printing provider schemas, run in the configuration root
    Command(Vec<String>),
}

impl Default for SchemaSource {
    fn default() -> Self {
        SchemaSource::Command(
            ["terraform", "providers", "schema", "-json"]
                .map(str::to_owned)
                .to_vec(),
        )
    }
}

#[derive(Debug, Clone, Default, derive_new::new)]
pub struct HclToolchain {
    schema_source: SchemaSource,
}

impl Toolchain for HclToolchain {
    #[tracing::instrument(level = "debug", skip_all, fields(root=%root.path.display()))]
    fn load_graph(&self, root: &ConfigRoot) -> Result<ResourceGraph, ToolchainError> {
        let mut documents = HclDocuments::default();
        documents.load_directory(root)?;

        let mut resources: IndexMap<String, Resource> = IndexMap::new();
        for (block_index, source, block) in documents.blocks() {
            let Some(mode) = Mode::of(block) else {
                continue;
            };

            let [type_name, name] = block.labels.as_slice() else {
                tracing::warn!(
                    path=%source.display_path(),
                    ident=block.ident.value().as_str(),
                    labels=block.labels.len(),
                    "skipping block, expected a type and a name label"
                );
                continue;
            };

            let address = mode.address(type_name.as_str(), name.as_str());
            if let Some(existing) = resources.get(&address) {
                let (existing_source, _) = declaration(&documents, existing);
                tracing::warn!(
                    %address,
                    path=%source.display_path(),
                    first=%existing_source.display_path(),
                    "duplicate declaration, keeping the first one"
                );
                continue;
            }

            let body: hcl::Body = block.body.clone().into();

            let mut collector = ReferenceCollector::default();
            collector.collect(&body);

            let provider = body
                .attributes()
                .find(|attribute| attribute.key.as_str() == "provider")
                .and_then(|attribute| traversal_path(&attribute.expr))
                .unwrap_or_else(|| implied_provider(type_name.as_str()));

            tracing::trace!(%address, references=?collector.references, "resource found");
            resources.insert(
                address,
                Resource {
                    mode,
                    type_name: type_name.as_str().to_owned(),
                    name: name.as_str().to_owned(),
                    provider,
                    references: collector.references,
                    dependencies: BTreeSet::new(),
                    block_index,
                },
            );
        }

        let addresses: HashSet<String> = resources.keys().cloned().collect();
        for (address, resource) in resources.iter_mut() {
            resource.dependencies = resource
                .references
                .iter()
                .filter(|reference| *reference != address && addresses.contains(*reference))
                .cloned()
                .collect();
        }

        tracing::info!(resources = resources.len(), "resource graph built");
        Ok(ResourceGraph {
            documents,
            resources,
        })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(root=%root.path.display()))]
    fn provider_schemas(&self, root: &ConfigRoot) -> Result<ProviderSchemas, ToolchainError> {
        let bytes = match &self.schema_source {
            SchemaSource::File(path) => {
                std::fs::read(path).map_err(|source| ToolchainError::SchemaRead {
                    path: path.clone(),
                    source,
                })?
            }
            SchemaSource::Command(command) => run_schema_command(command, &root.path)?,
        };

        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn declaration<'a>(documents: &'a HclDocuments, resource: &Resource) -> (&'a Source, &'a Block) {
    let (_, source, block) = documents.get_block(resource.block_index);
    (source, block)
}

/// `aws` for `aws_instance`
fn implied_provider(type_name: &str) -> String {
    type_name
        .split('_')
        .next()
        .unwrap_or(type_name)
        .to_owned()
}

fn run_schema_command(command: &[String], directory: &Path) -> Result<Vec<u8>, ToolchainError> {
    let (program, args) = command
        .split_first()
        .ok_or(ToolchainError::EmptySchemaCommand)?;

    tracing::info!(command=%command.join(" "), directory=%directory.display(), "loading provider schemas");
    let output = std::process::Command::new(program)
        .args(args)
        .current_dir(directory)
        .output()
        .map_err(|source| ToolchainError::SchemaCommandSpawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ToolchainError::SchemaCommandFailed {
            command: command.join(" "),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    Ok(output.stdout)
}

/// Provider schemas as printed by `terraform providers schema -json`
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProviderSchemas {
    #[serde(default)]
    pub format_version: Option<String>,
    #[serde(default)]
    pub provider_schemas: IndexMap<String, ProviderSchema>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProviderSchema {
    #[serde(default)]
    pub resource_schemas: IndexMap<String, Schema>,
    #[serde(default)]
    pub data_source_schemas: IndexMap<String, Schema>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub block: SchemaBlock,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SchemaBlock {
    #[serde(default)]
    pub attributes: IndexMap<String, SchemaAttribute>,
    #[serde(default)]
    pub block_types: IndexMap<String, SchemaBlockType>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SchemaAttribute {
    /// cty type, e.g. `"string"` or `["list", "string"]`
    #[serde(rename = "type", default)]
    pub attribute_type: Option<serde_json::Value>,
    #[serde(default)]
    pub nested_type: Option<serde_json::Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SchemaBlockType {
    #[serde(default)]
    pub nesting_mode: String,
    #[serde(default)]
    pub block: SchemaBlock,
    #[serde(default)]
    pub min_items: u64,
}
