//! Webhook event processing: comment matching, DM replies and the
//! logging of their effects.
//!
//! All handlers are stateless between calls; everything they learn or
//! decide is written to the document store.

pub mod logger;
pub mod matcher;
pub mod responder;
pub mod verify;

pub use logger::ConversationLogger;
pub use matcher::{CommentEvent, CommentMatcher, CommentOutcome, SkipReason};
pub use responder::{DmEvent, DmIntent, DmOutcome, DmResponder};
pub use verify::{Handshake, verify_handshake, verify_signature};
