//! Policy rule documents and the codec between rule tuples and documents.
//!
//! Casbin rules are ordered tuples of strings: a policy type (`p`, `g`,
//! `p2`, ...) followed by up to six values. Each rule is persisted as one
//! flat document with the fields `ptype` and `v0` through `v5`. Missing
//! values are stored as empty strings and trimmed again when loading.

use serde::{Deserialize, Serialize};

/// Maximum number of values a rule can carry after its ptype.
pub const MAX_RULE_VALUES: usize = 6;

/// A single policy rule as stored in the document collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CasbinRule {
    /// Storage-assigned document key. Empty until the rule has been stored.
    #[serde(rename = "_key", default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    /// Policy type (`p`, `g`, `p2`, `g2`, ...).
    #[serde(default)]
    pub ptype: String,
    /// Value at position 0.
    #[serde(default)]
    pub v0: String,
    /// Value at position 1.
    #[serde(default)]
    pub v1: String,
    /// Value at position 2.
    #[serde(default)]
    pub v2: String,
    /// Value at position 3.
    #[serde(default)]
    pub v3: String,
    /// Value at position 4.
    #[serde(default)]
    pub v4: String,
    /// Value at position 5.
    #[serde(default)]
    pub v5: String,
}

/// One of the seven indexed fields of a rule document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum RuleField {
    Ptype,
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
}

impl RuleField {
    /// Value fields in positional order.
    pub const VALUES: [RuleField; MAX_RULE_VALUES] = [
        RuleField::V0,
        RuleField::V1,
        RuleField::V2,
        RuleField::V3,
        RuleField::V4,
        RuleField::V5,
    ];

    /// All document fields, ptype first.
    pub const ALL: [RuleField; MAX_RULE_VALUES + 1] = [
        RuleField::Ptype,
        RuleField::V0,
        RuleField::V1,
        RuleField::V2,
        RuleField::V3,
        RuleField::V4,
        RuleField::V5,
    ];

    /// Returns the value field at `index` (0 for `v0`), if there is one.
    pub fn value(index: usize) -> Option<RuleField> {
        Self::VALUES.get(index).copied()
    }

    /// Returns the attribute name used in stored documents.
    pub fn name(self) -> &'static str {
        match self {
            RuleField::Ptype => "ptype",
            RuleField::V0 => "v0",
            RuleField::V1 => "v1",
            RuleField::V2 => "v2",
            RuleField::V3 => "v3",
            RuleField::V4 => "v4",
            RuleField::V5 => "v5",
        }
    }
}

impl std::fmt::Display for RuleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl CasbinRule {
    /// Builds a rule document from a ptype and its values.
    ///
    /// Values are copied by position into `v0..v5`. Positions without a
    /// value stay empty and values past the sixth are ignored; arity is
    /// enforced by the policy model, not here.
    pub fn encode<S: AsRef<str>>(ptype: &str, values: &[S]) -> Self {
        let mut rule = CasbinRule {
            ptype: ptype.to_string(),
            ..Default::default()
        };
        for (field, value) in RuleField::VALUES.iter().zip(values) {
            *rule.field_mut(*field) = value.as_ref().to_string();
        }
        rule
    }

    /// Converts the document back into a rule tuple `[ptype, v0, ...]`.
    ///
    /// Trailing empty values are trimmed; empty values in the middle are
    /// kept. Returns `None` for documents without a ptype, which do not
    /// describe a rule and are skipped by loaders.
    pub fn decode(&self) -> Option<Vec<String>> {
        if self.ptype.is_empty() {
            return None;
        }

        let mut line: Vec<String> = RuleField::ALL
            .iter()
            .map(|field| self.field(*field).to_string())
            .collect();
        while line.last().is_some_and(|value| value.is_empty()) {
            line.pop();
        }
        Some(line)
    }

    /// Returns the value stored in `field`.
    pub fn field(&self, field: RuleField) -> &str {
        match field {
            RuleField::Ptype => &self.ptype,
            RuleField::V0 => &self.v0,
            RuleField::V1 => &self.v1,
            RuleField::V2 => &self.v2,
            RuleField::V3 => &self.v3,
            RuleField::V4 => &self.v4,
            RuleField::V5 => &self.v5,
        }
    }

    fn field_mut(&mut self, field: RuleField) -> &mut String {
        match field {
            RuleField::Ptype => &mut self.ptype,
            RuleField::V0 => &mut self.v0,
            RuleField::V1 => &mut self.v1,
            RuleField::V2 => &mut self.v2,
            RuleField::V3 => &mut self.v3,
            RuleField::V4 => &mut self.v4,
            RuleField::V5 => &mut self.v5,
        }
    }

    /// Iterates over the non-empty value fields in positional order.
    pub fn present_values(&self) -> impl Iterator<Item = (RuleField, &str)> + '_ {
        RuleField::VALUES
            .iter()
            .map(|field| (*field, self.field(*field)))
            .filter(|(_, value)| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_encode_copies_values_by_position() {
        let rule = CasbinRule::encode("p", &["alice", "data1", "read"]);
        assert_eq!(rule.ptype, "p");
        assert_eq!(rule.v0, "alice");
        assert_eq!(rule.v1, "data1");
        assert_eq!(rule.v2, "read");
        assert!(rule.v3.is_empty());
        assert!(rule.key.is_empty());
    }

    #[test]
    fn test_encode_ignores_values_past_v5() {
        let rule = CasbinRule::encode("p", &["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(rule.v5, "f");
        assert_eq!(
            rule.decode().unwrap(),
            strings(&["p", "a", "b", "c", "d", "e", "f"])
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let cases: Vec<Vec<&str>> = vec![
            vec![],
            vec!["alice"],
            vec!["alice", "data1", "read"],
            vec!["alice", "domain1", "data1", "read", "allow", "x"],
        ];
        for values in cases {
            let rule = CasbinRule::encode("p", &values);
            let mut expected = vec!["p"];
            expected.extend(values.iter());
            assert_eq!(rule.decode().unwrap(), strings(&expected));
        }
    }

    #[test]
    fn test_decode_trims_only_trailing_empties() {
        let rule = CasbinRule::encode("p", &["alice", "", "read", "", ""]);
        assert_eq!(
            rule.decode().unwrap(),
            strings(&["p", "alice", "", "read"])
        );
    }

    #[test]
    fn test_decode_skips_empty_ptype() {
        let rule = CasbinRule::encode("", &["alice", "data1"]);
        assert!(rule.decode().is_none());
        assert!(CasbinRule::default().decode().is_none());
    }

    #[test]
    fn test_document_shape() {
        let rule = CasbinRule::encode("g", &["alice", "admin"]);
        let doc = serde_json::to_value(&rule).unwrap();
        assert!(doc.get("_key").is_none());
        assert_eq!(doc["ptype"], "g");
        assert_eq!(doc["v1"], "admin");
        assert_eq!(doc["v5"], "");

        let stored: CasbinRule = serde_json::from_value(serde_json::json!({
            "_key": "123",
            "_id": "casbin_rule/123",
            "_rev": "_abc",
            "ptype": "p",
            "v0": "bob"
        }))
        .unwrap();
        assert_eq!(stored.key, "123");
        assert_eq!(stored.decode().unwrap(), strings(&["p", "bob"]));
    }

    #[test]
    fn test_present_values() {
        let rule = CasbinRule::encode("p", &["alice", "", "read"]);
        let present: Vec<_> = rule.present_values().collect();
        assert_eq!(
            present,
            vec![(RuleField::V0, "alice"), (RuleField::V2, "read")]
        );
    }

    #[test]
    fn test_rule_field_lookup() {
        assert_eq!(RuleField::value(0), Some(RuleField::V0));
        assert_eq!(RuleField::value(5), Some(RuleField::V5));
        assert_eq!(RuleField::value(6), None);
        assert_eq!(RuleField::Ptype.to_string(), "ptype");
    }
}
