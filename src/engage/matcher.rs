//! Comment event matcher.
//!
//! Decides whether a comment on a media item fires its assigned flow and,
//! when it does, asks the commenter to follow and reply by DM.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::logger::ConversationLogger;
use crate::error::DatabaseError;
use crate::model::{Assignment, EventType, Flow, Message, Stored};
use crate::store::{Filter, find_record, to_document};

/// Agent prompt sent after a matching comment.
pub const FOLLOW_PROMPT: &str =
    "Hey! Thanks for commenting. If you enjoy this, consider following us for more. Reply with 'I followed' to continue.";

/// Inbound comment webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEvent {
    pub account_id: String,
    pub ig_media_id: String,
    pub ig_user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub text: String,
}

/// Why a comment did not fire a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoAssignment,
    FlowNotFound,
    KeywordNotMatched,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoAssignment => "No flow assigned",
            SkipReason::FlowNotFound => "Flow not found",
            SkipReason::KeywordNotMatched => "Keyword not matched",
        }
    }
}

/// Result of processing a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    Skipped(SkipReason),
    /// The follow prompt was sent; the next step is the contact's DM reply.
    AskedFollow,
}

impl Serialize for CommentOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            processed: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            action: Option<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            next: Option<&'static str>,
        }

        let wire = match self {
            CommentOutcome::Skipped(reason) => Wire {
                processed: false,
                reason: Some(reason.as_str()),
                action: None,
                next: None,
            },
            CommentOutcome::AskedFollow => Wire {
                processed: true,
                reason: None,
                action: Some("asked_follow"),
                next: Some("wait_for_dm_reply"),
            },
        };
        wire.serialize(serializer)
    }
}

/// Case-insensitive keyword gate. An empty keyword list always matches.
pub fn keyword_matches(keywords: &[String], text: &str) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = text.to_lowercase();
    keywords.iter().any(|k| text.contains(&k.to_lowercase()))
}

#[derive(Clone)]
pub struct CommentMatcher {
    logger: ConversationLogger,
}

impl CommentMatcher {
    pub fn new(logger: ConversationLogger) -> Self {
        Self { logger }
    }

    /// Flow for an assignment: by id, else the account's first flow.
    async fn resolve_flow(
        &self,
        assignment: &Assignment,
    ) -> Result<Option<Stored<Flow>>, DatabaseError> {
        let store = self.logger.store();
        if !assignment.flow_id.is_empty() {
            let by_id = Filter::by_id(&assignment.flow_id);
            if let Some(flow) = find_record::<Flow>(store, &by_id).await? {
                return Ok(Some(flow));
            }
            debug!(
                flow_id = %assignment.flow_id,
                "Assigned flow missing, falling back to account flow"
            );
        }
        find_record::<Flow>(store, &Filter::all().eq("accountId", &assignment.account_id)).await
    }

    pub async fn handle(&self, event: &CommentEvent) -> Result<CommentOutcome, DatabaseError> {
        let store = self.logger.store();

        let filter = Filter::all()
            .eq("igMediaId", &event.ig_media_id)
            .eq("accountId", &event.account_id);
        let Some(assignment) = find_record::<Assignment>(store, &filter).await? else {
            debug!(media_id = %event.ig_media_id, "No assignment for media");
            return Ok(CommentOutcome::Skipped(SkipReason::NoAssignment));
        };

        let Some(flow) = self.resolve_flow(&assignment.record).await? else {
            return Ok(CommentOutcome::Skipped(SkipReason::FlowNotFound));
        };

        if !keyword_matches(&flow.record.keywords, &event.text) {
            debug!(flow_id = %flow.id, "Comment did not match flow keywords");
            return Ok(CommentOutcome::Skipped(SkipReason::KeywordNotMatched));
        }

        self.logger
            .upsert_contact(&event.account_id, &event.ig_user_id, event.username.as_deref())
            .await?;

        self.logger
            .log_messages(
                &event.account_id,
                &event.ig_user_id,
                vec![
                    Message::user(format!("Commented: {}", event.text)),
                    Message::agent(FOLLOW_PROMPT),
                ],
            )
            .await?;

        self.logger
            .record_event(EventType::CommentTrigger, &event.account_id, to_document(event)?)
            .await?;

        info!(
            account_id = %event.account_id,
            media_id = %event.ig_media_id,
            flow_id = %flow.id,
            "Comment triggered flow"
        );
        Ok(CommentOutcome::AskedFollow)
    }
}
