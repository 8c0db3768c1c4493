//! Case routing by first-message recipients.
//!
//! `rules` holds the pure TO/CC matching; `router` wires it to the rule
//! cache and the stores.

pub mod router;
pub mod rules;
pub mod types;

pub use router::CaseRouter;
pub use types::{MatchedField, Message, RoutingDecision, RoutingOutcome, RoutingRule};
