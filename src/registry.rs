//! Accounts, flows and assignments. Thin create/list wrappers over the store.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DatabaseError;
use crate::model::{Account, Assignment, Flow, Record};
use crate::store::{Document, DocumentStore, Filter, insert_record};

/// Body of `POST /connect`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    pub account_name: String,
}

/// Body of `POST /assign`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub account_id: String,
    pub ig_media_id: String,
    pub flow_id: String,
}

impl From<AssignRequest> for Assignment {
    fn from(req: AssignRequest) -> Self {
        Assignment {
            account_id: req.account_id,
            ig_media_id: req.ig_media_id,
            flow_id: req.flow_id,
        }
    }
}

/// Create an account with the default settings. Returns its id.
pub async fn connect_account(
    store: &dyn DocumentStore,
    account_name: &str,
) -> Result<String, DatabaseError> {
    let id = insert_record(store, &Account::connected(account_name)).await?;
    info!(account_id = %id, account_name, "Account connected");
    Ok(id)
}

pub async fn create_flow(store: &dyn DocumentStore, flow: &Flow) -> Result<String, DatabaseError> {
    let id = insert_record(store, flow).await?;
    info!(
        flow_id = %id,
        account_id = %flow.account_id,
        keywords = flow.keywords.len(),
        "Flow created"
    );
    Ok(id)
}

/// Flow documents, optionally scoped to one account, with string `_id`s.
///
/// Returned raw so fields written by other tools survive the round trip.
pub async fn list_flows(
    store: &dyn DocumentStore,
    account_id: Option<&str>,
) -> Result<Vec<Document>, DatabaseError> {
    let filter = Filter::all().eq_opt("accountId", account_id);
    store.find_many(Flow::COLLECTION, &filter).await
}

pub async fn create_assignment(
    store: &dyn DocumentStore,
    assignment: &Assignment,
) -> Result<String, DatabaseError> {
    let id = insert_record(store, assignment).await?;
    info!(
        assignment_id = %id,
        media_id = %assignment.ig_media_id,
        flow_id = %assignment.flow_id,
        "Flow assigned to media"
    );
    Ok(id)
}
