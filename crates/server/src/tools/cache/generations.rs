//! cache_generations tool implementation.
//!
//! Lists stored cache generations alongside the active version's names.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::Serialize;
use waypost_core::{GenerationNames, GenerationSummary};

use crate::state::AppState;
use crate::tools::json_result;

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    /// Generation names of the active version, if one is active.
    pub current: Option<GenerationNames>,
    pub generations: Vec<GenerationSummary>,
}

pub async fn generations_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let output = CacheGenerationsOutput {
        current: state.lifecycle.active_names().await,
        generations: state.lifecycle.db().list_generations().await?,
    };
    json_result(&output)
}
