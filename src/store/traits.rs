//! Store traits — the two narrow seams the router needs.
//!
//! `RoutingStore` is read-only (rules and messages); `CaseStore` owns the
//! single write the router performs. One backend may implement both.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::routing::types::{CaseId, Message, RoutingId, RuleRow};

/// Read access to routing rules and case messages.
#[async_trait]
pub trait RoutingStore: Send + Sync {
    /// All rules that are not marked inactive, in configuration order.
    async fn active_rules(&self) -> Result<Vec<RuleRow>, DatabaseError>;

    /// The earliest message on a case, or `None` if the case has none.
    async fn first_message(&self, case_id: CaseId) -> Result<Option<Message>, DatabaseError>;
}

/// Write access to the case record.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Set the case's assigned routing target.
    async fn set_assigned(&self, case_id: CaseId, routing: RoutingId)
    -> Result<(), DatabaseError>;
}
