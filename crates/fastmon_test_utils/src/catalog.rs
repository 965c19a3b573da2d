//! In-memory catalog that records every call.

use async_trait::async_trait;
use fastmon_agent::{CatalogApi, CatalogError, Method};
use fastmon_protocol::RecordId;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    calls: Vec<CatalogCall>,
    runs: Vec<Value>,
    failures: Vec<(Method, String)>,
    bare_list: bool,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Fake catalog. Clones share state, so a test keeps one handle and gives
/// another to the agent.
#[derive(Clone, Default)]
pub struct MockCatalog {
    state: Arc<Mutex<State>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed an existing run.
    pub fn with_run(self, run_number: u64, run_id: impl Into<RecordId>) -> Self {
        let run_id = run_id.into();
        self.lock().runs.push(json!({
            "run_id": run_id,
            "run_number": run_number,
        }));
        self
    }

    /// Answer run lookups with a bare list instead of `{"results": [...]}`.
    pub fn with_bare_list(self) -> Self {
        self.lock().bare_list = true;
        self
    }

    /// Fail every `method` call whose path starts with `path_prefix` with a 500.
    pub fn fail_on(self, method: Method, path_prefix: &str) -> Self {
        self.lock().failures.push((method, path_prefix.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, method: Method, path_prefix: &str) -> Vec<CatalogCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(path_prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method, path_prefix: &str) -> usize {
        self.calls_to(method, path_prefix).len()
    }

    pub fn runs(&self) -> Vec<Value> {
        self.lock().runs.clone()
    }
}

fn with_field(body: Option<Value>, key: &str, value: Value) -> Value {
    let mut body = body.unwrap_or_else(|| json!({}));
    if let Value::Object(map) = &mut body {
        map.insert(key.to_string(), value);
    }
    body
}

#[async_trait]
impl CatalogApi for MockCatalog {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CatalogError> {
        let mut state = self.lock();
        state.calls.push(CatalogCall {
            method,
            path: path.to_string(),
            body: body.clone(),
        });

        let injected = state
            .failures
            .iter()
            .any(|(m, prefix)| *m == method && path.starts_with(prefix.as_str()));
        if injected {
            return Err(CatalogError::Status {
                method,
                path: path.to_string(),
                status: 500,
                body: "injected failure".to_string(),
            });
        }

        match (method, path) {
            (Method::Get, p) if p.starts_with("/runs/?run_number=") => {
                let number: Option<u64> = p["/runs/?run_number=".len()..].parse().ok();
                let matches: Vec<Value> = state
                    .runs
                    .iter()
                    .filter(|run| run["run_number"].as_u64() == number)
                    .cloned()
                    .collect();
                if state.bare_list {
                    Ok(Value::Array(matches))
                } else {
                    Ok(json!({ "count": matches.len(), "results": matches }))
                }
            }
            (Method::Post, "/runs/") => {
                let id = state.next_id();
                let run = with_field(body, "run_id", json!(id));
                state.runs.push(run.clone());
                Ok(run)
            }
            (Method::Post, "/stf-files/") => {
                let id = state.next_id();
                Ok(with_field(body, "file_id", json!(format!("stf-{}", id))))
            }
            (Method::Post, "/fastmon-files/") => {
                let id = state.next_id();
                Ok(with_field(body, "tf_file_id", json!(format!("tf-{}", id))))
            }
            (Method::Post, "/workflow-stages/") => {
                let id = state.next_id();
                Ok(with_field(body, "id", json!(id)))
            }
            (Method::Patch, p) if p.starts_with("/workflow-stages/") => {
                Ok(body.unwrap_or(Value::Null))
            }
            _ => Err(CatalogError::Status {
                method,
                path: path.to_string(),
                status: 404,
                body: "not found".to_string(),
            }),
        }
    }
}
