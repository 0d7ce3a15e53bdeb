//! Store connectivity report for `GET /test`.
//!
//! The only place store errors are caught and reported as text instead of
//! failing the request.

use serde::Serialize;

use crate::store::DocumentStore;

/// Maximum collections listed in the report.
const MAX_COLLECTIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticsReport {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    pub collections: Vec<String>,
}

/// What the process was configured with, independent of the live store.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredDatabase {
    pub url_set: bool,
    pub name_set: bool,
}

fn set_marker(set: bool) -> String {
    if set { "✅ Set" } else { "❌ Not Set" }.to_string()
}

/// Truncate an error message to its first 50 characters.
fn short_error(e: &impl std::fmt::Display) -> String {
    e.to_string().chars().take(50).collect()
}

pub async fn run(store: &dyn DocumentStore, configured: &ConfiguredDatabase) -> DiagnosticsReport {
    let mut report = DiagnosticsReport {
        backend: "✅ Running".to_string(),
        database: "❌ Not Available".to_string(),
        database_url: set_marker(configured.url_set),
        database_name: set_marker(configured.name_set),
        connection_status: "Not Connected".to_string(),
        collections: Vec::new(),
    };

    if let Err(e) = store.ping().await {
        report.database = format!("❌ Error: {}", short_error(&e));
        return report;
    }
    report.database = format!("✅ Available ({})", store.backend_name());
    report.connection_status = "Connected".to_string();

    match store.list_collections().await {
        Ok(mut names) => {
            names.truncate(MAX_COLLECTIONS);
            report.collections = names;
            report.database = "✅ Connected & Working".to_string();
        }
        Err(e) => {
            report.database = format!("⚠️  Connected but Error: {}", short_error(&e));
        }
    }
    report
}
