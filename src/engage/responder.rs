//! Direct-message responder.
//!
//! Every DM is classified from its text alone; no conversation history is
//! consulted, so replaying a message repeats its writes.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::logger::ConversationLogger;
use crate::config::OptOutSource;
use crate::error::DatabaseError;
use crate::model::{Account, EventType, Message};
use crate::store::{Filter, find_record, to_document};

/// Replies confirming the contact followed the account.
pub const FOLLOW_CONFIRMATIONS: &[&str] = &["i followed", "followed", "yes"];

/// Opt-out replies used when no account list applies.
pub const DEFAULT_OPT_OUT: &[&str] = &["stop", "unsubscribe"];

/// Agent message carrying the promised asset.
pub const DELIVERY_MESSAGE: &str =
    "Awesome! Here is your promised item: https://example.com/asset?token=demo";

/// Hint returned for unrecognized replies.
pub const REPLY_HINT: &str = "Reply 'I followed' to proceed or 'STOP' to opt out.";

/// Inbound DM webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmEvent {
    pub account_id: String,
    pub ig_user_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmIntent {
    Deliver,
    OptOut,
    Other,
}

/// Classify a DM by its trimmed, lowercased text.
///
/// `opt_out` entries must already be normalized.
pub fn classify<S: AsRef<str>>(text: &str, opt_out: &[S]) -> DmIntent {
    let normalized = text.trim().to_lowercase();
    if FOLLOW_CONFIRMATIONS.contains(&normalized.as_str()) {
        DmIntent::Deliver
    } else if opt_out.iter().any(|k| k.as_ref() == normalized) {
        DmIntent::OptOut
    } else {
        DmIntent::Other
    }
}

/// Result of processing a DM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmOutcome {
    Delivered,
    OptedOut,
    Acknowledged,
}

impl Serialize for DmOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            DmOutcome::Delivered => serde_json::json!({ "delivered": true }),
            DmOutcome::OptedOut => serde_json::json!({ "opted_out": true }),
            DmOutcome::Acknowledged => serde_json::json!({ "ack": true, "hint": REPLY_HINT }),
        };
        value.serialize(serializer)
    }
}

#[derive(Clone)]
pub struct DmResponder {
    logger: ConversationLogger,
    opt_out_source: OptOutSource,
}

impl DmResponder {
    pub fn new(logger: ConversationLogger, opt_out_source: OptOutSource) -> Self {
        Self {
            logger,
            opt_out_source,
        }
    }

    /// Opt-out keywords in effect for an account.
    pub async fn opt_out_keywords(&self, account_id: &str) -> Result<Vec<String>, DatabaseError> {
        let builtin = || -> Vec<String> { DEFAULT_OPT_OUT.iter().map(|s| s.to_string()).collect() };
        if self.opt_out_source == OptOutSource::Builtin {
            return Ok(builtin());
        }

        let account =
            find_record::<Account>(self.logger.store(), &Filter::by_id(account_id)).await?;
        match account.and_then(|a| a.record.opt_out_keywords()) {
            Some(keywords) => Ok(keywords),
            None => {
                debug!(account_id, "No account opt-out list, using builtin keywords");
                Ok(builtin())
            }
        }
    }

    pub async fn handle(&self, event: &DmEvent) -> Result<DmOutcome, DatabaseError> {
        let opt_out = self.opt_out_keywords(&event.account_id).await?;
        let intent = classify(&event.text, &opt_out);
        let payload = to_document(event)?;

        let outcome = match intent {
            DmIntent::Deliver => {
                self.logger
                    .record_event(EventType::DeliverAsset, &event.account_id, payload)
                    .await?;
                self.logger
                    .log_messages(
                        &event.account_id,
                        &event.ig_user_id,
                        vec![Message::agent(DELIVERY_MESSAGE)],
                    )
                    .await?;
                DmOutcome::Delivered
            }
            DmIntent::OptOut => {
                self.logger
                    .record_event(EventType::OptOut, &event.account_id, payload)
                    .await?;
                DmOutcome::OptedOut
            }
            DmIntent::Other => {
                self.logger
                    .record_event(EventType::DmOther, &event.account_id, payload)
                    .await?;
                DmOutcome::Acknowledged
            }
        };

        info!(
            account_id = %event.account_id,
            ig_user_id = %event.ig_user_id,
            outcome = ?outcome,
            "DM handled"
        );
        Ok(outcome)
    }
}
