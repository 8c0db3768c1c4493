//! Case router — loads rules, finds the first message, assigns the case.
//!
//! Straight-line pipeline with early exits:
//! 1. `load_rules()` — cache first, store on miss (cached only when non-empty)
//! 2. `load_first_message()` — earliest message on the case
//! 3. `evaluate_match()` — TO before CC
//! 4. `apply_assignment()` — write only actionable decisions

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::RuleCache;
use crate::config::RouterConfig;
use crate::error::{CacheError, Result};
use crate::routing::rules::evaluate_match;
use crate::routing::types::{CaseId, Message, RoutingDecision, RoutingOutcome, RoutingRule};
use crate::store::{CaseStore, RoutingStore};

/// Assigns cases to routing targets from their first message's recipients.
pub struct CaseRouter {
    store: Arc<dyn RoutingStore>,
    cases: Arc<dyn CaseStore>,
    cache: Arc<dyn RuleCache>,
    config: RouterConfig,
}

impl CaseRouter {
    pub fn new(
        store: Arc<dyn RoutingStore>,
        cases: Arc<dyn CaseStore>,
        cache: Arc<dyn RuleCache>,
        config: RouterConfig,
    ) -> Self {
        Self {
            store,
            cases,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route a single case.
    ///
    /// "Nothing to do" conditions are reported as outcomes, not errors.
    /// Store and cache failures propagate.
    pub async fn route(&self, case_id: CaseId) -> Result<RoutingOutcome> {
        let rules = self.load_rules().await?;
        if rules.is_empty() {
            debug!(case_id, "No active routing rules, skipping");
            return Ok(RoutingOutcome::NoRules);
        }

        let Some(message) = self.load_first_message(case_id).await? else {
            debug!(case_id, "Case has no messages, skipping");
            return Ok(RoutingOutcome::NoMessage);
        };

        let decision = evaluate_match(&rules, &message);
        debug!(case_id, decision = ?decision, "Routing decision");

        let Some(decision) = decision else {
            return Ok(RoutingOutcome::NoMatch);
        };

        self.apply_assignment(case_id, Some(&decision)).await?;

        Ok(if decision.is_actionable() {
            RoutingOutcome::Assigned {
                routing: decision.routing,
                matched_field: decision.matched_field,
            }
        } else {
            RoutingOutcome::CcNotAllowed {
                routing: decision.routing,
            }
        })
    }

    /// Load the active rule list, preferring the cache.
    ///
    /// An empty result is never cached, so the next call queries again.
    pub async fn load_rules(&self) -> Result<Vec<RoutingRule>> {
        let key = self.config.rules_cache_key.as_str();

        if let Some(cached) = self.cache.get(key).await? {
            let rules: Vec<RoutingRule> =
                serde_json::from_str(&cached).map_err(CacheError::from)?;
            debug!(count = rules.len(), "Loaded routing rules from cache");
            return Ok(rules);
        }

        let rules: Vec<RoutingRule> = self
            .store
            .active_rules()
            .await?
            .into_iter()
            .map(RoutingRule::from)
            .collect();

        if rules.is_empty() {
            return Ok(rules);
        }

        let payload = serde_json::to_string(&rules).map_err(CacheError::from)?;
        self.cache.put(key, payload, self.config.rules_ttl).await?;

        debug!(
            count = rules.len(),
            ttl_secs = self.config.rules_ttl.as_secs(),
            "Loaded routing rules from store"
        );
        Ok(rules)
    }

    /// The earliest message on the case, if any.
    pub async fn load_first_message(&self, case_id: CaseId) -> Result<Option<Message>> {
        let message = self.store.first_message(case_id).await?;
        debug!(case_id, message = ?message, "First message lookup");
        Ok(message)
    }

    /// Write the decision's routing target to the case when it is actionable.
    pub async fn apply_assignment(
        &self,
        case_id: CaseId,
        decision: Option<&RoutingDecision>,
    ) -> Result<()> {
        let Some(decision) = decision else {
            debug!(case_id, "No matching TO/CC found, skipping routing");
            return Ok(());
        };

        if !decision.is_actionable() {
            debug!(
                case_id,
                routing = decision.routing,
                "CC match not allowed for rule, leaving case unassigned"
            );
            return Ok(());
        }

        self.cases.set_assigned(case_id, decision.routing).await?;
        info!(
            case_id,
            routing = decision.routing,
            matched_field = %decision.matched_field,
            "Case assigned"
        );
        Ok(())
    }
}
