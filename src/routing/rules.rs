//! Recipient matching against routing rules.
//!
//! Pure functions, no I/O:
//! - TO addresses are checked first; any TO match wins outright
//! - CC addresses are only consulted when no TO address matched
//! - A message without TO recipients is never routable, whatever its CC says
//!
//! Ordering is the only tie-break: first address in field order, then first
//! rule in rule-list order.

use tracing::debug;

use crate::routing::types::{MatchedField, Message, RoutingDecision, RoutingRule};

/// Split a raw recipient field on `,` or `;` and normalize each address.
///
/// Field order is preserved. Only an absent or empty field yields no
/// addresses; blank pieces such as the tail of `"a@x.com;"` are kept as `""`.
pub fn normalize_emails(field: Option<&str>) -> Vec<String> {
    match field {
        None | Some("") => Vec::new(),
        Some(field) => field
            .split([',', ';'])
            .map(|e| e.trim().to_lowercase())
            .collect(),
    }
}

/// Evaluate a message against the rule list.
///
/// Returns `None` if the message has no TO recipients or nothing matches.
pub fn evaluate_match(rules: &[RoutingRule], message: &Message) -> Option<RoutingDecision> {
    let to_emails = normalize_emails(message.to.as_deref());
    if to_emails.is_empty() {
        debug!("Message has no TO recipients, not routable");
        return None;
    }

    if let Some(decision) = first_match(rules, &to_emails, MatchedField::To) {
        return Some(decision);
    }

    let cc_emails = normalize_emails(message.cc.as_deref());
    if cc_emails.is_empty() {
        return None;
    }

    first_match(rules, &cc_emails, MatchedField::Cc)
}

fn first_match(
    rules: &[RoutingRule],
    emails: &[String],
    field: MatchedField,
) -> Option<RoutingDecision> {
    emails.iter().find_map(|email| {
        rules
            .iter()
            .find(|rule| rule.target_email == *email)
            .map(|rule| {
                debug!(
                    email = %email,
                    routing = rule.routing,
                    matched_field = %field,
                    "Recipient matched routing rule"
                );
                RoutingDecision {
                    routing: rule.routing,
                    allow_when_cc: rule.allow_when_cc,
                    matched_field: field,
                }
            })
    })
}
