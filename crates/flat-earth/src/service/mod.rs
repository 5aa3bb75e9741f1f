//! HTTP interface to the resource graph
//!
//! | route                           | request              | response                 |
//! |---------------------------------|----------------------|--------------------------|
//! | `GET /get-flat-earth-graph`     |                      | [GraphSnapshot]          |
//! | `GET /get-provider-schema`      |                      | [ProviderSchemaSnapshot] |
//! | `POST /create-new-block`        | [CreateBlockRequest] | the new block as text    |
//! | `POST /update-flat-earth-graph` | [UpdateGraphRequest] | [GraphSnapshot]          |
//!
//! Failures are answered with `{"kind": ..., "message": ...}`, see [ApiError].
mod error;
mod locks;

pub use error::{ApiError, ErrorBody};
pub use locks::FileLocks;

use crate::hcl_documents::ConfigRoot;
use crate::locator::{self, BlockKey};
use crate::snapshot::{snapshot_graph, snapshot_schema, GraphSnapshot, ProviderSchemaSnapshot};
use crate::toolchain::Toolchain;
use crate::value::{self, Tagged};
use crate::{builder, editor};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use indexmap::IndexMap;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root: ConfigRoot,
    /// Reject updates of attributes the provider schema doesn't know
    pub enforce_schema: bool,
}

#[derive(Clone)]
pub struct GraphService {
    config: Arc<ServiceConfig>,
    toolchain: Arc<dyn Toolchain>,
    locks: FileLocks,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlockRequest {
    #[serde(alias = "BlockType")]
    pub block_type: String,
    #[serde(alias = "BlockName")]
    pub block_name: String,
    #[serde(alias = "BlockLabel")]
    pub block_label: String,
    #[serde(alias = "Attributes", default)]
    pub attributes: IndexMap<String, Tagged>,
    /// Append the block to `<root>/<blockName>_<blockLabel>.tf`
    #[serde(alias = "Persist", default)]
    pub persist: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGraphRequest {
    #[serde(alias = "BlockType")]
    pub block_type: String,
    #[serde(alias = "BlockName")]
    pub block_name: String,
    #[serde(alias = "BlockLabel")]
    pub block_label: String,
    #[serde(alias = "AttributeName")]
    pub attribute_name: String,
    #[serde(alias = "NewValue")]
    pub new_value: serde_json::Value,
    #[serde(alias = "AttributeType")]
    pub attribute_type: String,
}

impl GraphService {
    pub fn new(config: ServiceConfig, toolchain: impl Toolchain + 'static) -> Self {
        Self {
            config: Arc::new(config),
            toolchain: Arc::new(toolchain),
            locks: FileLocks::default(),
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/get-flat-earth-graph", get(get_graph))
            .route("/get-provider-schema", get(get_schema))
            .route("/create-new-block", post(create_block))
            .route("/update-flat-earth-graph", post(update_graph))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self)
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(
            addr=%listener.local_addr()?,
            root=%self.config.root.path.display(),
            "listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("shut down");
        Ok(())
    }

    /// Run filesystem work off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&GraphService) -> Result<T, ApiError> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || f(&service)).await?
    }

    async fn snapshot(&self) -> Result<GraphSnapshot, ApiError> {
        self.blocking(|service| Ok(snapshot_graph(service.toolchain.as_ref(), &service.config.root)?))
            .await
    }
}

async fn get_graph(State(service): State<GraphService>) -> Result<Json<GraphSnapshot>, ApiError> {
    Ok(Json(service.snapshot().await?))
}

async fn get_schema(
    State(service): State<GraphService>,
) -> Result<Json<ProviderSchemaSnapshot>, ApiError> {
    let schema = service
        .blocking(|service| Ok(snapshot_schema(service.toolchain.as_ref(), &service.config.root)?))
        .await?;

    Ok(Json(schema))
}

async fn create_block(
    State(service): State<GraphService>,
    payload: Result<Json<CreateBlockRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let labels = [request.block_name.clone(), request.block_label.clone()];
    let bytes = builder::build(&request.block_type, &labels, &request.attributes)?;

    if request.persist {
        let path = builder::target_file(
            &service.config.root.path,
            &request.block_name,
            &request.block_label,
        );
        let _guard = service.locks.lock(&path).await;

        let contents = bytes.clone();
        service
            .blocking(move |_| Ok(editor::append_atomic(&path, &contents)?))
            .await?;
    }

    tracing::info!(
        block_type = %request.block_type,
        labels=?labels,
        persisted = request.persist,
        "block created"
    );
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], bytes))
}

async fn update_graph(
    State(service): State<GraphService>,
    payload: Result<Json<UpdateGraphRequest>, JsonRejection>,
) -> Result<Json<GraphSnapshot>, ApiError> {
    let Json(request) = payload?;

    let value = value::decode(&request.attribute_type, &request.new_value)?;
    let key = BlockKey::new(
        request.block_type,
        vec![request.block_name, request.block_label],
    );
    let attribute = request.attribute_name;

    let source_file = {
        let key = key.clone();
        let attribute = attribute.clone();
        service
            .blocking(move |service| {
                let handle = locator::find(&service.config.root, &key)?
                    .ok_or_else(|| ApiError::NotFound(format!("no block {key}")))?;

                if service.config.enforce_schema {
                    let schema = snapshot_schema(service.toolchain.as_ref(), &service.config.root)?;
                    editor::check_writable(&schema, &key, &attribute)?;
                }

                Ok(handle.source_file)
            })
            .await?
    };

    {
        let _guard = service.locks.lock(&source_file).await;
        let key = key.clone();
        let attribute = attribute.clone();
        service
            .blocking(move |_| {
                // the file may have changed since the block was located
                let mut handle = locator::find_in_file(&source_file, &key)?
                    .ok_or_else(|| ApiError::NotFound(format!("no block {key}")))?;

                let bytes = editor::set_attribute(&mut handle, &attribute, value)?;
                editor::write_atomic(&source_file, &bytes)?;
                Ok(())
            })
            .await?;
    }

    tracing::info!(%key, %attribute, "attribute updated");
    Ok(Json(service.snapshot().await?))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error=%err, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error=%err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
