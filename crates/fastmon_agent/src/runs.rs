//! Run resolution: find the catalog run for a run number, creating it if absent.

use crate::catalog::{get_json, post_json, CatalogApi, CatalogError};
use chrono::Utc;
use fastmon_protocol::{NewRun, RunRecord};
use serde_json::{json, Value};
use tracing::info;

/// Shape of a run lookup response.
///
/// The catalog answers either with a paginated `{"results": [...]}` object or
/// with a bare list, depending on the deployment.
#[derive(Debug, Clone, PartialEq)]
pub enum RunLookup {
    Empty,
    One(Value),
    Many(Vec<Value>),
}

impl RunLookup {
    pub fn from_response(value: Value) -> Self {
        let items = match value {
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            Value::Array(items) => items,
            _ => Vec::new(),
        };

        match items.len() {
            0 => RunLookup::Empty,
            1 => RunLookup::One(items.into_iter().next().unwrap_or(Value::Null)),
            _ => RunLookup::Many(items),
        }
    }

    /// The first matching run, if any.
    pub fn first(self) -> Option<Value> {
        match self {
            RunLookup::Empty => None,
            RunLookup::One(value) => Some(value),
            RunLookup::Many(items) => items.into_iter().next(),
        }
    }
}

/// Look up a run by number; create it when the catalog has none.
///
/// Created runs are marked `auto_created` in their run conditions.
pub async fn get_or_create_run(
    api: &dyn CatalogApi,
    run_number: u64,
) -> Result<RunRecord, CatalogError> {
    let path = format!("/runs/?run_number={}", run_number);
    let response: Value = get_json(api, &path).await?;

    if let Some(existing) = RunLookup::from_response(response).first() {
        return serde_json::from_value(existing).map_err(|source| CatalogError::Decode {
            path,
            source,
        });
    }

    let new_run = NewRun {
        run_number,
        start_time: Utc::now(),
        run_conditions: json!({ "auto_created": true }),
    };
    let created: RunRecord = post_json(api, "/runs/", &new_run).await?;
    info!("Created new run {} (id {})", run_number, created.run_id);
    Ok(created)
}
