//! Shared types for case routing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a support case.
pub type CaseId = i64;

/// Opaque identifier of a routing target (territory, queue, team).
pub type RoutingId = i64;

// ── Rules ───────────────────────────────────────────────────────────

/// Raw active-rule row as returned by the routing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRow {
    /// Target email exactly as configured.
    pub routing_email: String,
    /// Routing target assigned on match.
    pub routing: RoutingId,
    /// CC-permission flag; only the literal `"T"` enables CC routing.
    pub allow_routing_cc: Option<String>,
}

/// A configured routing rule with its email already normalized.
///
/// This is also the cached shape, so the serde names are part of the cache
/// payload format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub target_email: String,
    pub routing: RoutingId,
    pub allow_when_cc: bool,
}

impl RoutingRule {
    pub fn new(target_email: &str, routing: RoutingId, allow_when_cc: bool) -> Self {
        Self {
            target_email: normalize_email(target_email),
            routing,
            allow_when_cc,
        }
    }
}

impl From<RuleRow> for RoutingRule {
    fn from(row: RuleRow) -> Self {
        Self {
            target_email: normalize_email(&row.routing_email),
            routing: row.routing,
            allow_when_cc: row.allow_routing_cc.as_deref() == Some("T"),
        }
    }
}

/// Lowercase and trim a single address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ── Messages ────────────────────────────────────────────────────────

/// Recipient fields of the earliest message on a case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Raw `,`/`;` delimited TO recipients.
    pub to: Option<String>,
    /// Raw `,`/`;` delimited CC recipients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
}

impl Message {
    pub fn new(to: Option<&str>, cc: Option<&str>) -> Self {
        Self {
            to: to.map(String::from),
            cc: cc.map(String::from),
        }
    }
}

// ── Decisions ───────────────────────────────────────────────────────

/// Which recipient field produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchedField {
    To,
    Cc,
}

impl fmt::Display for MatchedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::To => f.write_str("TO"),
            Self::Cc => f.write_str("CC"),
        }
    }
}

/// Result of matching a message against the rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub routing: RoutingId,
    /// Copied from the matched rule. Irrelevant for TO matches.
    pub allow_when_cc: bool,
    pub matched_field: MatchedField,
}

impl RoutingDecision {
    /// Whether this decision may be written to the case.
    ///
    /// TO matches always are; CC matches only when the rule permits it.
    pub fn is_actionable(&self) -> bool {
        match self.matched_field {
            MatchedField::To => true,
            MatchedField::Cc => self.allow_when_cc,
        }
    }
}

/// What a single routing invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// No active rules are configured.
    NoRules,
    /// The case has no messages.
    NoMessage,
    /// No rule matched a usable recipient.
    NoMatch,
    /// A CC address matched a rule that does not allow CC routing.
    CcNotAllowed { routing: RoutingId },
    /// The case was assigned to `routing`.
    Assigned {
        routing: RoutingId,
        matched_field: MatchedField,
    },
}

impl fmt::Display for RoutingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRules => f.write_str("no active routing rules"),
            Self::NoMessage => f.write_str("case has no messages"),
            Self::NoMatch => f.write_str("no matching recipient"),
            Self::CcNotAllowed { routing } => {
                write!(f, "CC match for routing {routing} not allowed")
            }
            Self::Assigned {
                routing,
                matched_field,
            } => write!(f, "assigned to routing {routing} via {matched_field}"),
        }
    }
}
