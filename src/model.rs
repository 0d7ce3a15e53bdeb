//! Typed records for every collection in the document store.
//!
//! Field names are camelCase on the wire and in the store so documents
//! written by other tools stay readable.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record type persisted in its own collection.
pub trait Record: Serialize + serde::de::DeserializeOwned + Send + Sync {
    /// Collection name in the document store.
    const COLLECTION: &'static str;
}

/// A record together with its store-generated identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

// ── Account ─────────────────────────────────────────────────────────────

/// Tenant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Friendly account name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fb_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ig_business_id: Option<String>,
    /// Access tokens and metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    /// Misc settings such as the opt-out keyword list.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl Record for Account {
    const COLLECTION: &'static str = "account";
}

impl Account {
    /// Settings key holding the opt-out keyword list.
    pub const OPT_OUT_SETTING: &'static str = "opt_out";

    /// A freshly connected account with the default opt-out keywords.
    pub fn connected(name: impl Into<String>) -> Self {
        let mut settings = Map::new();
        settings.insert(
            Self::OPT_OUT_SETTING.to_string(),
            serde_json::json!(["STOP", "UNSUBSCRIBE"]),
        );
        Self {
            owner_id: None,
            name: name.into(),
            fb_app_id: None,
            page_id: None,
            ig_business_id: None,
            tokens: None,
            webhook_secret: None,
            settings,
        }
    }

    /// Opt-out keywords from settings, normalized. `None` if the setting is
    /// absent or not a list of strings.
    pub fn opt_out_keywords(&self) -> Option<Vec<String>> {
        let list = self.settings.get(Self::OPT_OUT_SETTING)?.as_array()?;
        list.iter()
            .map(|v| v.as_str().map(|s| s.trim().to_lowercase()))
            .collect()
    }
}

// ── Flow ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    #[default]
    Active,
    Inactive,
}

/// Graph node of a flow. Stored, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Graph edge of a flow. Stored, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Keyword-triggered automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub account_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keywords that trigger this flow from comments (case-insensitive).
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub status: FlowStatus,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl Record for Flow {
    const COLLECTION: &'static str = "flow";
}

impl Flow {
    /// A minimal active flow with the given keywords.
    pub fn new(account_id: impl Into<String>, name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            account_id: account_id.into(),
            name: name.into(),
            description: None,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: Map::new(),
            status: FlowStatus::Active,
            version: default_version(),
        }
    }
}

// ── Assignment ──────────────────────────────────────────────────────────

/// Binding of one media id to one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub account_id: String,
    pub ig_media_id: String,
    pub flow_id: String,
}

impl Record for Assignment {
    const COLLECTION: &'static str = "assignment";
}

// ── Contact ─────────────────────────────────────────────────────────────

/// Per-account profile of an Instagram user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(rename = "IGUser")]
pub struct Contact {
    pub account_id: String,
    pub ig_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl Record for Contact {
    const COLLECTION: &'static str = "iguser";
}

impl Contact {
    pub fn first_seen(
        account_id: impl Into<String>,
        ig_user_id: impl Into<String>,
        username: Option<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            ig_user_id: ig_user_id.into(),
            username,
            follower_status: None,
            tags: Vec::new(),
            attributes: Map::new(),
            last_interaction_at: Some(Utc::now()),
        }
    }
}

// ── Conversation ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            ts: Some(Utc::now()),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
            ts: Some(Utc::now()),
        }
    }
}

/// Logged messages exchanged with one contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub account_id: String,
    pub ig_user_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Record for Conversation {
    const COLLECTION: &'static str = "conversation";
}

// ── Event ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CommentTrigger,
    DeliverAsset,
    OptOut,
    DmOther,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CommentTrigger => "comment_trigger",
            EventType::DeliverAsset => "deliver_asset",
            EventType::OptOut => "opt_out",
            EventType::DmOther => "dm_other",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable analytics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub account_id: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Record for Event {
    const COLLECTION: &'static str = "event";
}

// ── Schema map ──────────────────────────────────────────────────────────

/// Collections owned by the service, in a stable order.
pub const COLLECTIONS: &[&str] = &[
    Account::COLLECTION,
    Flow::COLLECTION,
    Assignment::COLLECTION,
    Contact::COLLECTION,
    Conversation::COLLECTION,
    Event::COLLECTION,
];

/// JSON Schema for each entity, keyed by entity name.
pub fn schema_map() -> Map<String, Value> {
    fn schema<T: JsonSchema>() -> Value {
        serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
    }

    let mut models = Map::new();
    models.insert("Account".into(), schema::<Account>());
    models.insert("Flow".into(), schema::<Flow>());
    models.insert("Assignment".into(), schema::<Assignment>());
    models.insert("IGUser".into(), schema::<Contact>());
    models.insert("Conversation".into(), schema::<Conversation>());
    models.insert("Event".into(), schema::<Event>());
    models
}
