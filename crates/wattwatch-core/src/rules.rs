//! Ordered, de-duplicated set of budget rules

use tracing::{info, warn};
use wattwatch_api::{Rule, RuleFields};
use wattwatch_util::{Result, RuleId, WattwatchError};

/// The rule set in insertion order.
///
/// At most one rule exists per {target, period, metric}. Every mutation is
/// validated first and leaves the set untouched when rejected.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: Vec<Rule>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from persisted rules, keeping their order
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn list(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: &RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| &r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Add a rule. Rejected if another rule already covers the same slot.
    pub fn create(&mut self, fields: RuleFields) -> Result<Rule> {
        validate_fields(&fields)?;
        self.check_duplicate(&fields, None)?;

        let rule = Rule::new(fields);
        info!(
            rule_id = %rule.id,
            target = fields.target.as_str(),
            limit = fields.limit,
            "Rule created"
        );
        self.rules.push(rule.clone());
        Ok(rule)
    }

    /// Replace a rule's fields in place, keeping its id and position
    pub fn update(&mut self, id: &RuleId, fields: RuleFields) -> Result<Rule> {
        let index = self
            .position(id)
            .ok_or_else(|| WattwatchError::RuleNotFound(id.clone()))?;
        validate_fields(&fields)?;
        self.check_duplicate(&fields, Some(id))?;

        let rule = &mut self.rules[index];
        rule.fields = fields;
        info!(rule_id = %id, limit = fields.limit, "Rule updated");
        Ok(rule.clone())
    }

    pub fn delete(&mut self, id: &RuleId) -> Result<Rule> {
        let index = self
            .position(id)
            .ok_or_else(|| WattwatchError::RuleNotFound(id.clone()))?;
        let rule = self.rules.remove(index);
        info!(rule_id = %id, "Rule deleted");
        Ok(rule)
    }

    fn position(&self, id: &RuleId) -> Option<usize> {
        self.rules.iter().position(|r| &r.id == id)
    }

    fn check_duplicate(&self, fields: &RuleFields, editing: Option<&RuleId>) -> Result<()> {
        let conflict = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, r)| Some(&r.id) != editing && r.fields.same_slot(fields));

        match conflict {
            Some((index, existing)) => {
                warn!(
                    existing = %existing.id,
                    index,
                    target = fields.target.as_str(),
                    "Rule rejected as duplicate"
                );
                Err(WattwatchError::DuplicateRule {
                    existing: existing.id.clone(),
                    index,
                })
            }
            None => Ok(()),
        }
    }
}

fn validate_fields(fields: &RuleFields) -> Result<()> {
    if !fields.metric.is_rule_metric() {
        return Err(WattwatchError::invalid_rule(format!(
            "metric '{}' cannot be budgeted",
            fields.metric.label()
        )));
    }
    if !fields.limit.is_finite() || fields.limit <= 0.0 {
        return Err(WattwatchError::invalid_rule(
            "limit must be a positive number",
        ));
    }
    Ok(())
}
