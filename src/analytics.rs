//! Analytics summary. Plain counts, no derived metrics.

use serde::Serialize;

use crate::error::DatabaseError;
use crate::model::{Conversation, Event, EventType, Record};
use crate::store::{DocumentStore, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AnalyticsSummary {
    pub comments_processed: u64,
    pub assets_delivered: u64,
    pub opt_outs: u64,
    pub conversations: u64,
}

/// Count events by type and conversations, optionally for one account.
pub async fn summarize(
    store: &dyn DocumentStore,
    account_id: Option<&str>,
) -> Result<AnalyticsSummary, DatabaseError> {
    let scope = Filter::all().eq_opt("accountId", account_id);
    let events_of = |kind: EventType| scope.clone().eq("type", kind.as_str());

    Ok(AnalyticsSummary {
        comments_processed: store
            .count(Event::COLLECTION, &events_of(EventType::CommentTrigger))
            .await?,
        assets_delivered: store
            .count(Event::COLLECTION, &events_of(EventType::DeliverAsset))
            .await?,
        opt_outs: store
            .count(Event::COLLECTION, &events_of(EventType::OptOut))
            .await?,
        conversations: store.count(Conversation::COLLECTION, &scope).await?,
    })
}
