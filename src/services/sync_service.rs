//! Pulls the full subscriber listing from Phantom and upserts it into the
//! local client table.
//!
//! Upstream rows are positional arrays:
//! `[external_id, <ignored>, last_name, first_name, address, city, ...]`.
//! Rows with fewer than six fields or a blank identifier are skipped.
//! Only identity fields are written; phone, status and notes stay local.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::clients::{PhantomError, SubscriberDirectory, phantom::value_to_text};
use crate::clock::Clock;
use crate::constants::phantom::SUBSCRIBER_ROW_MIN_FIELDS;
use crate::db::{ClientIdentity, Store, format_timestamp};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Upstream(#[from] PhantomError),

    #[error("Unexpected subscriber listing shape: {0}")]
    UnexpectedShape(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub inserted: u64,
    pub updated: u64,
    pub total: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSubscribers {
    pub rows: Vec<ClientIdentity>,
    pub skipped: u64,
}

/// Converts the upstream listing into client identities.
///
/// # Errors
///
/// Returns [`SyncError::UnexpectedShape`] if the root is not an array.
pub fn parse_subscriber_rows(root: &Value) -> Result<ParsedSubscribers, SyncError> {
    let Some(items) = root.as_array() else {
        return Err(SyncError::UnexpectedShape(format!(
            "expected an array, got {}",
            json_kind(root)
        )));
    };

    let mut parsed = ParsedSubscribers::default();

    for item in items {
        let Some(fields) = item.as_array().filter(|f| f.len() >= SUBSCRIBER_ROW_MIN_FIELDS) else {
            parsed.skipped += 1;
            continue;
        };

        let external_id = value_to_text(&fields[0]).trim().to_string();
        if external_id.is_empty() {
            parsed.skipped += 1;
            continue;
        }

        let text = |i: usize| value_to_text(&fields[i]).trim().to_string();

        parsed.rows.push(ClientIdentity {
            external_id,
            last_name: text(2),
            first_name: text(3),
            address: text(4),
            city: text(5),
        });
    }

    Ok(parsed)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct SyncService {
    store: Store,
    directory: Arc<dyn SubscriberDirectory>,
    clock: Arc<dyn Clock>,
}

impl SyncService {
    #[must_use]
    pub fn new(store: Store, directory: Arc<dyn SubscriberDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    pub async fn sync_subscribers(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();

        let root = self.directory.fetch_all_subscribers().await?;
        let parsed = parse_subscriber_rows(&root)?;

        if parsed.skipped > 0 {
            warn!(skipped = parsed.skipped, "Skipped malformed subscriber rows");
        }

        let now = format_timestamp(self.clock.now());
        let counts = self
            .store
            .client_repo()
            .upsert_identities(&parsed.rows, &now)
            .await?;

        let report = SyncReport {
            inserted: counts.inserted,
            updated: counts.updated,
            total: counts.inserted + counts.updated,
            skipped: parsed.skipped,
        };

        metrics::counter!("phantom_sync_runs_total").increment(1);
        metrics::counter!("phantom_sync_clients_inserted_total").increment(report.inserted);
        metrics::counter!("phantom_sync_clients_updated_total").increment(report.updated);

        info!(
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Subscriber sync finished"
        );

        Ok(report)
    }
}
