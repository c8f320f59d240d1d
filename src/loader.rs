use std::fs;
use std::path::Path;

use prost::Message;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::importer::import_graph_def;
use crate::protos::tensorflow::{GraphDef, VersionDef};
use crate::registry::OpRegistry;

/// GraphDef version this build consumes.
pub const GRAPH_DEF_VERSION: i32 = 1766;

/// Oldest producer version still accepted.
pub const GRAPH_DEF_VERSION_MIN_PRODUCER: i32 = 0;

/// Load a GraphDef file using the built-in op registry.
pub fn load_graph_from_path<P: AsRef<Path>>(path: P) -> Result<Graph, GraphError> {
    let registry = OpRegistry::builtin()?;
    load_graph_with_registry(path, &registry)
}

pub fn load_graph_with_registry<P: AsRef<Path>>(
    path: P,
    registry: &OpRegistry,
) -> Result<Graph, GraphError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "loading graph");
    load_graph_from_bytes(&bytes, registry)
}

pub fn load_graph_from_bytes(bytes: &[u8], registry: &OpRegistry) -> Result<Graph, GraphError> {
    let graph_def = GraphDef::decode(bytes)?;
    check_versions(graph_def.versions.as_ref())?;
    import_graph_def(&graph_def, registry)
}

fn check_versions(versions: Option<&VersionDef>) -> Result<(), GraphError> {
    let Some(versions) = versions else {
        return Ok(());
    };

    if versions.producer < GRAPH_DEF_VERSION_MIN_PRODUCER {
        return Err(GraphError::UnsupportedVersion {
            reason: format!(
                "producer version {} is below the minimum supported {}",
                versions.producer, GRAPH_DEF_VERSION_MIN_PRODUCER
            ),
        });
    }
    if versions.min_consumer > GRAPH_DEF_VERSION {
        return Err(GraphError::UnsupportedVersion {
            reason: format!(
                "graph requires consumer version {} but this build supports {}",
                versions.min_consumer, GRAPH_DEF_VERSION
            ),
        });
    }
    if versions.bad_consumers.contains(&GRAPH_DEF_VERSION) {
        return Err(GraphError::UnsupportedVersion {
            reason: format!("consumer version {GRAPH_DEF_VERSION} is disallowed by the graph"),
        });
    }
    Ok(())
}
