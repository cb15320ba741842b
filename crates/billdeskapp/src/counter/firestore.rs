//! Firestore REST transport for the remote counter store.
//!
//! Talks to the v1 REST API with a blocking `ureq` agent:
//!
//! ```text
//! POST {base}/documents:beginTransaction   -> { "transaction": "..." }
//! GET  {base}/documents/{coll}/{doc}?transaction=...
//! POST {base}/documents:commit             { "writes": [...], "transaction": "..." }
//! POST {base}/documents:rollback           { "transaction": "..." }
//! ```
//!
//! where `{base}` is `{endpoint}/v1/projects/{project}/databases/(default)`.
//! The endpoint is the public service, or `http://$FIRESTORE_EMULATOR_HOST`
//! when an emulator host is configured. Aborted commits come back as
//! `409 Conflict` and are surfaced as [`BillingError::RemoteConflict`].

use super::remote_backend::{state_fields, RemoteBackend, RemoteFields, RemoteWrite};
use crate::config::RemoteConfig;
use crate::error::{BillingError, Result};
use crate::model::DocumentType;
use serde_json::{json, Map, Value};
use std::time::Duration;

const PUBLIC_ENDPOINT: &str = "https://firestore.googleapis.com";

pub struct FirestoreBackend {
    agent: ureq::Agent,
    database_url: String,
    document_path: String,
    document_name: String,
    access_token: Option<String>,
}

impl FirestoreBackend {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let project_id = config
            .project_id
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| BillingError::Config("remote project id is not set".to_string()))?;

        let endpoint = match config.emulator_host.as_deref() {
            Some(host) if !host.is_empty() => format!("http://{}", host),
            _ => PUBLIC_ENDPOINT.to_string(),
        };
        let database = format!("projects/{}/databases/(default)", project_id);
        let document_path = format!("{}/{}", config.collection, config.document);

        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(agent_config),
            database_url: format!("{}/v1/{}", endpoint, database),
            document_name: format!("{}/documents/{}", database, document_path),
            document_path,
            access_token: config.access_token.clone(),
        })
    }

    /// Build the backend and read the counter document once, so an
    /// unreachable or unauthorised service is detected up front.
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let backend = Self::new(config)?;
        backend.get(None)?;
        tracing::debug!(document = %backend.document_name, "firestore reachable");
        Ok(backend)
    }

    fn document_url(&self) -> String {
        format!("{}/documents/{}", self.database_url, self.document_path)
    }

    fn post(&self, action: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/documents:{}", self.database_url, action);
        let bytes = serde_json::to_vec(body)?;

        let mut request = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", &format!("Bearer {}", token));
        }

        let mut response = request
            .send(&bytes[..])
            .map_err(|e| map_error(action, e))?;
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| map_error(action, e))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl RemoteBackend for FirestoreBackend {
    fn begin(&self) -> Result<String> {
        let response = self.post("beginTransaction", &json!({ "options": { "readWrite": {} } }))?;
        response
            .get("transaction")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BillingError::Remote("beginTransaction returned no transaction".to_string()))
    }

    fn get(&self, txn: Option<&str>) -> Result<Option<RemoteFields>> {
        let mut request = self.agent.get(&self.document_url());
        if let Some(txn) = txn {
            request = request.query("transaction", txn);
        }
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", &format!("Bearer {}", token));
        }

        let mut response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(e) => return Err(map_error("get", e)),
        };
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| map_error("get", e))?;
        let document: Value = serde_json::from_str(&text)?;
        decode_fields(&document).map(Some)
    }

    fn commit(&self, txn: &str, write: RemoteWrite) -> Result<()> {
        let body = json!({
            "writes": [encode_write(&self.document_name, &write)],
            "transaction": txn,
        });
        self.post("commit", &body)?;
        Ok(())
    }

    fn rollback(&self, txn: &str) -> Result<()> {
        self.post("rollback", &json!({ "transaction": txn }))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.document_name.clone()
    }
}

fn map_error(action: &str, err: ureq::Error) -> BillingError {
    match err {
        ureq::Error::StatusCode(409) => {
            BillingError::RemoteConflict(format!("{} aborted by a concurrent writer", action))
        }
        ureq::Error::StatusCode(code) => {
            BillingError::Remote(format!("{} failed with HTTP {}", action, code))
        }
        other => BillingError::Remote(format!("{} failed: {}", action, other)),
    }
}

/// Integer fields of a Firestore document.
///
/// Non-counter fields of other types are skipped. A counter field that is
/// present but not a valid integer is an error: reading it as absent would
/// restart that sequence at 1.
fn decode_fields(document: &Value) -> Result<RemoteFields> {
    let mut fields = RemoteFields::new();
    let Some(map) = document.get("fields").and_then(Value::as_object) else {
        return Ok(fields);
    };
    for (name, value) in map {
        let parsed = match value.get("integerValue") {
            Some(Value::String(s)) => s.parse::<i64>().ok(),
            Some(Value::Number(n)) => n.as_i64(),
            _ => None,
        };
        match parsed {
            Some(v) => {
                fields.insert(name.clone(), v);
            }
            None if is_counter_field(name) => {
                return Err(BillingError::InvalidValue {
                    field: name.clone(),
                    message: format!("expected an integer counter, got {}", value),
                });
            }
            None => {}
        }
    }
    Ok(fields)
}

fn is_counter_field(name: &str) -> bool {
    DocumentType::ALL.iter().any(|t| t.counter_field() == name)
}

fn encode_write(document_name: &str, write: &RemoteWrite) -> Value {
    let (updates, must_not_exist) = match write {
        RemoteWrite::Create(state) => (state_fields(state).to_vec(), true),
        RemoteWrite::Merge { field, value } => (vec![(*field, *value)], false),
        RemoteWrite::Set(state) => (state_fields(state).to_vec(), false),
    };

    let mut fields = Map::new();
    for (name, value) in &updates {
        fields.insert(
            name.to_string(),
            json!({ "integerValue": value.to_string() }),
        );
    }
    let paths: Vec<&str> = updates.iter().map(|(name, _)| *name).collect();

    let mut write = json!({
        "update": { "name": document_name, "fields": fields },
        "updateMask": { "fieldPaths": paths },
    });
    if must_not_exist {
        write["currentDocument"] = json!({ "exists": false });
    }
    write
}
