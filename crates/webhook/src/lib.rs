//! Webhook receiver: signature verification, event parsing, and routing to
//! durable side effects (spec §4.1).

pub mod events;
pub mod router;
pub mod signature;

pub use router::{AcceptedChangeEvent, AcceptedScraperEvent, WebhookRouter};
