//! Query builder for rule documents.
//!
//! Adapter operations are translated into a [`RuleQuery`]: an ordered list
//! of field predicates plus the action to perform on every matching
//! document. Backends either render the query into AQL with bound
//! parameters ([`RuleQuery::to_aql`]) or evaluate it directly
//! ([`RuleQuery::matches`]).
//!
//! Every user-supplied value ends up in the bind parameter map; the query
//! text only ever contains field names and placeholders.
//!
//! # Example
//!
//! ```
//! use casbin_arangodb_adapter::query::RuleQuery;
//! use casbin_arangodb_adapter::rule::CasbinRule;
//!
//! let rule = CasbinRule::encode("p", &["alice", "data1", "read"]);
//! let aql = RuleQuery::remove_exact(&rule).to_aql("casbin_rule");
//!
//! assert_eq!(
//!     aql.query,
//!     "FOR doc IN @@collection FILTER doc.ptype == @ptype && doc.v0 == @v0 \
//!      && doc.v1 == @v1 && doc.v2 == @v2 REMOVE doc IN @@collection"
//! );
//! assert_eq!(aql.bind_vars["v0"], "alice");
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::filter::Filter;
use crate::rule::{CasbinRule, MAX_RULE_VALUES, RuleField};

/// Bind parameter holding the collection name.
pub const COLLECTION_BIND_VAR: &str = "@collection";

/// The condition a single field must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The field equals the value.
    Equals(String),
    /// The field equals one of the values.
    OneOf(Vec<String>),
}

/// A condition on one document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// The constrained field.
    pub field: RuleField,
    /// The condition the field must satisfy.
    pub condition: Condition,
}

impl Predicate {
    /// Returns true if `rule` satisfies this predicate.
    pub fn matches(&self, rule: &CasbinRule) -> bool {
        let value = rule.field(self.field);
        match &self.condition {
            Condition::Equals(expected) => value == expected,
            Condition::OneOf(candidates) => candidates.iter().any(|c| c == value),
        }
    }

    fn render(&self) -> String {
        let name = self.field.name();
        match self.condition {
            Condition::Equals(_) => format!("doc.{name} == @{name}"),
            Condition::OneOf(_) => format!("doc.{name} IN @{name}"),
        }
    }

    fn bind_value(&self) -> Value {
        match &self.condition {
            Condition::Equals(value) => Value::String(value.clone()),
            Condition::OneOf(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// What happens to the documents matched by a query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryAction {
    /// Return the matching documents.
    #[default]
    Return,
    /// Remove the matching documents.
    Remove,
    /// Replace `ptype` and `v0..v5` of the matching documents.
    Update(CasbinRule),
}

/// A query over the rule collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleQuery {
    predicates: Vec<Predicate>,
    action: QueryAction,
}

/// AQL text with its bind parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AqlQuery {
    /// The AQL statement.
    pub query: String,
    /// Values for every `@name` and `@@name` placeholder in the statement.
    #[serde(rename = "bindVars")]
    pub bind_vars: Map<String, Value>,
}

impl RuleQuery {
    /// A query returning every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches documents with the rule's ptype and all of its non-empty
    /// values.
    ///
    /// A rule without values matches every document of its ptype.
    pub fn exact(rule: &CasbinRule) -> Self {
        let mut query = Self::default().equals(RuleField::Ptype, rule.ptype.clone());
        for (field, value) in rule.present_values() {
            query = query.equals(field, value);
        }
        query
    }

    /// Removes the documents [`exact`](Self::exact) matches.
    pub fn remove_exact(rule: &CasbinRule) -> Self {
        Self::exact(rule).remove()
    }

    /// Removes documents of `ptype` whose values starting at `field_index`
    /// equal `field_values`.
    ///
    /// The value at position `k` constrains field `v{field_index + k}`.
    /// Positions past `v5` are ignored.
    pub fn remove_filtered<S: AsRef<str>>(
        ptype: &str,
        field_index: usize,
        field_values: &[S],
    ) -> Self {
        let mut query = Self::default().equals(RuleField::Ptype, ptype);
        for position in 0..MAX_RULE_VALUES {
            if position < field_index {
                continue;
            }
            let Some(value) = field_values.get(position - field_index) else {
                break;
            };
            if let Some(field) = RuleField::value(position) {
                query = query.equals(field, value.as_ref());
            }
        }
        query.remove()
    }

    /// Returns documents matching `filter`.
    ///
    /// Fields with an empty candidate list are left unconstrained.
    pub fn filtered(filter: &Filter) -> Self {
        let mut query = Self::default();
        for field in RuleField::ALL {
            let candidates = filter.candidates(field);
            if !candidates.is_empty() {
                query = query.one_of(field, candidates.to_vec());
            }
        }
        query
    }

    /// Rewrites documents exactly matching `old` to hold the fields of `new`.
    pub fn update(old: &CasbinRule, new: CasbinRule) -> Self {
        let mut query = Self::exact(old);
        query.action = QueryAction::Update(new);
        query
    }

    /// Adds an equality predicate, replacing any predicate on `field`.
    pub fn equals(self, field: RuleField, value: impl Into<String>) -> Self {
        self.with_predicate(Predicate {
            field,
            condition: Condition::Equals(value.into()),
        })
    }

    /// Adds a membership predicate, replacing any predicate on `field`.
    pub fn one_of(self, field: RuleField, values: Vec<String>) -> Self {
        self.with_predicate(Predicate {
            field,
            condition: Condition::OneOf(values),
        })
    }

    fn with_predicate(mut self, predicate: Predicate) -> Self {
        match self
            .predicates
            .iter_mut()
            .find(|existing| existing.field == predicate.field)
        {
            Some(existing) => *existing = predicate,
            None => self.predicates.push(predicate),
        }
        self
    }

    /// Turns this query into a removal of the matched documents.
    pub fn remove(mut self) -> Self {
        self.action = QueryAction::Remove;
        self
    }

    /// Returns the predicates in the order they were added.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the action applied to matching documents.
    pub fn action(&self) -> &QueryAction {
        &self.action
    }

    /// Returns true if `rule` satisfies every predicate.
    pub fn matches(&self, rule: &CasbinRule) -> bool {
        self.predicates.iter().all(|p| p.matches(rule))
    }

    /// Renders the query as AQL against `collection`.
    pub fn to_aql(&self, collection: &str) -> AqlQuery {
        let mut bind_vars = Map::new();
        bind_vars.insert(
            COLLECTION_BIND_VAR.to_string(),
            Value::String(collection.to_string()),
        );

        let mut query = String::from("FOR doc IN @@collection");
        if !self.predicates.is_empty() {
            let clauses: Vec<String> = self.predicates.iter().map(Predicate::render).collect();
            query.push_str(" FILTER ");
            query.push_str(&clauses.join(" && "));
            for predicate in &self.predicates {
                bind_vars.insert(predicate.field.name().to_string(), predicate.bind_value());
            }
        }

        match &self.action {
            QueryAction::Return => query.push_str(" RETURN doc"),
            QueryAction::Remove => query.push_str(" REMOVE doc IN @@collection"),
            QueryAction::Update(new) => {
                let assignments: Vec<String> = RuleField::ALL
                    .iter()
                    .map(|field| format!("{0}: @new_{0}", field.name()))
                    .collect();
                query.push_str(" UPDATE doc WITH { ");
                query.push_str(&assignments.join(", "));
                query.push_str(" } IN @@collection");
                for field in RuleField::ALL {
                    bind_vars.insert(
                        format!("new_{}", field.name()),
                        Value::String(new.field(field).to_string()),
                    );
                }
            }
        }

        AqlQuery { query, bind_vars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(ptype: &str, values: &[&str]) -> CasbinRule {
        CasbinRule::encode(ptype, values)
    }

    #[test]
    fn test_all_returns_every_document() {
        let aql = RuleQuery::all().to_aql("casbin_rule");
        assert_eq!(aql.query, "FOR doc IN @@collection RETURN doc");
        assert_eq!(aql.bind_vars.len(), 1);
        assert_eq!(aql.bind_vars["@collection"], "casbin_rule");
    }

    #[test]
    fn test_exact_skips_empty_values() {
        let query = RuleQuery::remove_exact(&rule("p", &["alice", "", "read"]));
        let aql = query.to_aql("rules");
        assert_eq!(
            aql.query,
            "FOR doc IN @@collection FILTER doc.ptype == @ptype && doc.v0 == @v0 \
             && doc.v2 == @v2 REMOVE doc IN @@collection"
        );
        assert!(!aql.bind_vars.contains_key("v1"));
        assert_eq!(aql.bind_vars["v2"], "read");
    }

    #[test]
    fn test_exact_without_values_matches_whole_ptype() {
        let query = RuleQuery::exact(&rule("g", &[]));
        assert_eq!(query.predicates().len(), 1);
        assert!(query.matches(&rule("g", &["alice", "admin"])));
        assert!(!query.matches(&rule("p", &["alice", "admin"])));
    }

    #[test]
    fn test_remove_filtered_offsets_values() {
        let query = RuleQuery::remove_filtered("p", 1, &["data1", "read"]);
        let fields: Vec<RuleField> = query.predicates().iter().map(|p| p.field).collect();
        assert_eq!(fields, vec![RuleField::Ptype, RuleField::V1, RuleField::V2]);

        let aql = query.to_aql("rules");
        assert_eq!(aql.bind_vars["v1"], "data1");
        assert_eq!(aql.bind_vars["v2"], "read");
        assert!(aql.query.ends_with("REMOVE doc IN @@collection"));

        assert!(query.matches(&rule("p", &["bob", "data1", "read"])));
        assert!(!query.matches(&rule("p", &["bob", "data2", "read"])));
    }

    #[test]
    fn test_remove_filtered_ignores_positions_past_v5() {
        let query = RuleQuery::remove_filtered("p", 4, &["a", "b", "c", "d"]);
        let fields: Vec<RuleField> = query.predicates().iter().map(|p| p.field).collect();
        assert_eq!(fields, vec![RuleField::Ptype, RuleField::V4, RuleField::V5]);

        let query = RuleQuery::remove_filtered("p", 7, &["a"]);
        assert_eq!(query.predicates().len(), 1);
    }

    #[test]
    fn test_remove_filtered_binds_empty_values() {
        let query = RuleQuery::remove_filtered("p", 0, &["", "data1"]);
        assert!(query.matches(&rule("p", &["", "data1"])));
        assert!(!query.matches(&rule("p", &["alice", "data1"])));
    }

    #[test]
    fn test_filtered_uses_membership() {
        let filter = Filter::new().ptype(["p"]).value(0, ["alice", "bob"]);
        let query = RuleQuery::filtered(&filter);
        let aql = query.to_aql("rules");
        assert_eq!(
            aql.query,
            "FOR doc IN @@collection FILTER doc.ptype IN @ptype && doc.v0 IN @v0 RETURN doc"
        );
        assert_eq!(aql.bind_vars["v0"], serde_json::json!(["alice", "bob"]));

        assert!(query.matches(&rule("p", &["bob", "data1"])));
        assert!(!query.matches(&rule("p", &["carol", "data1"])));
        assert!(!query.matches(&rule("g", &["alice", "admin"])));
    }

    #[test]
    fn test_unconstrained_filter_matches_everything() {
        let query = RuleQuery::filtered(&Filter::default());
        assert!(query.predicates().is_empty());
        assert!(query.matches(&rule("p", &["anyone"])));
    }

    #[test]
    fn test_update_binds_all_new_fields() {
        let old = rule("p", &["alice", "data1", "read"]);
        let new = rule("p", &["alice", "data1", "write"]);
        let aql = RuleQuery::update(&old, new).to_aql("rules");

        assert!(aql.query.contains(
            "UPDATE doc WITH { ptype: @new_ptype, v0: @new_v0, v1: @new_v1, v2: @new_v2, \
             v3: @new_v3, v4: @new_v4, v5: @new_v5 } IN @@collection"
        ));
        assert_eq!(aql.bind_vars["v2"], "read");
        assert_eq!(aql.bind_vars["new_v2"], "write");
        assert_eq!(aql.bind_vars["new_v5"], "");
    }

    #[test]
    fn test_later_predicate_replaces_earlier_on_same_field() {
        let query = RuleQuery::all()
            .equals(RuleField::V0, "alice")
            .equals(RuleField::V0, "bob");
        assert_eq!(query.predicates().len(), 1);
        assert!(query.matches(&rule("p", &["bob"])));
    }

    #[test]
    fn test_values_never_appear_in_query_text() {
        let hostile = rule("p", &["x\" || true || \"", "data1"]);
        let aql = RuleQuery::remove_exact(&hostile).to_aql("rules");
        assert!(!aql.query.contains("true"));
        assert_eq!(aql.bind_vars["v0"], "x\" || true || \"");
    }
}
