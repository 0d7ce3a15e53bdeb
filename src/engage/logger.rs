//! Conversation & event logger.
//!
//! Persists the effects of a decided action: contact upserts, conversation
//! records and analytics events. No transactions; a failure part-way leaves
//! earlier writes in place.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Map;
use tracing::{debug, info};

use crate::config::ConversationMode;
use crate::error::DatabaseError;
use crate::model::{Contact, Conversation, Event, EventType, Message, Stored};
use crate::store::{DocumentStore, Filter, find_record, insert_record, replace_record};

#[derive(Clone)]
pub struct ConversationLogger {
    store: Arc<dyn DocumentStore>,
    mode: ConversationMode,
}

impl ConversationLogger {
    pub fn new(store: Arc<dyn DocumentStore>, mode: ConversationMode) -> Self {
        Self { store, mode }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Create the contact for `(account_id, ig_user_id)` if it does not
    /// exist yet. An existing contact is returned untouched.
    pub async fn upsert_contact(
        &self,
        account_id: &str,
        ig_user_id: &str,
        username: Option<&str>,
    ) -> Result<Stored<Contact>, DatabaseError> {
        let filter = Filter::all()
            .eq("igUserId", ig_user_id)
            .eq("accountId", account_id);
        if let Some(existing) = find_record::<Contact>(self.store(), &filter).await? {
            debug!(contact_id = %existing.id, "Contact already known");
            return Ok(existing);
        }

        let contact = Contact::first_seen(account_id, ig_user_id, username.map(str::to_string));
        let id = insert_record(self.store(), &contact).await?;
        info!(contact_id = %id, account_id, ig_user_id, "Contact created");
        Ok(Stored {
            id,
            record: contact,
        })
    }

    /// Log messages exchanged with a contact. Returns the conversation id.
    ///
    /// In `PerInteraction` mode every call creates a new conversation
    /// document. In `Thread` mode the messages are appended to the first
    /// conversation for the contact, created if absent.
    pub async fn log_messages(
        &self,
        account_id: &str,
        ig_user_id: &str,
        messages: Vec<Message>,
    ) -> Result<String, DatabaseError> {
        let now = Utc::now();

        if self.mode == ConversationMode::Thread {
            let filter = Filter::all()
                .eq("accountId", account_id)
                .eq("igUserId", ig_user_id);
            if let Some(mut thread) = find_record::<Conversation>(self.store(), &filter).await? {
                thread.record.messages.extend(messages);
                thread.record.last_message_at = Some(now);
                replace_record(self.store(), &thread.id, &thread.record).await?;
                debug!(conversation_id = %thread.id, "Appended to conversation thread");
                return Ok(thread.id);
            }
        }

        let conversation = Conversation {
            account_id: account_id.to_string(),
            ig_user_id: ig_user_id.to_string(),
            messages,
            state: Map::new(),
            last_message_at: Some(now),
        };
        let id = insert_record(self.store(), &conversation).await?;
        debug!(conversation_id = %id, account_id, ig_user_id, "Conversation recorded");
        Ok(id)
    }

    /// Record an immutable analytics event. Returns the event id.
    pub async fn record_event(
        &self,
        event_type: EventType,
        account_id: &str,
        payload: Map<String, serde_json::Value>,
    ) -> Result<String, DatabaseError> {
        let event = Event {
            event_type,
            account_id: account_id.to_string(),
            payload,
        };
        let id = insert_record(self.store(), &event).await?;
        info!(event_id = %id, event_type = %event_type, account_id, "Event recorded");
        Ok(id)
    }
}
