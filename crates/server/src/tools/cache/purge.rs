//! cache_purge tool implementation.
//!
//! Purges one cache generation, or all of them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_core::Error;

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete only this generation.
    pub generation: Option<String>,

    /// Delete every generation, current ones included.
    #[serde(default)]
    pub all: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of generations deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(state: &AppState, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let db = state.lifecycle.db();

    let deleted = match (params.generation, params.all) {
        (Some(_), true) => {
            return Err(Error::InvalidInput("generation and all are mutually exclusive".to_string()).into());
        }
        (Some(name), false) => u64::from(db.delete_generation(&name).await?),
        (None, true) => db.purge_all().await?,
        (None, false) => {
            return Err(Error::InvalidInput("Either generation or all must be specified".to_string()).into());
        }
    };

    tracing::info!(deleted, "cache purged");
    json_result(&CachePurgeOutput { deleted })
}
