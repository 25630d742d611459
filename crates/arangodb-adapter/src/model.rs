//! The in-memory policy model the adapter loads into and saves from.
//!
//! Policy evaluation is the enforcer's job; the adapter only needs a place
//! to put loaded rules and a way to enumerate rules for a full save. The
//! [`PolicyModel`] trait captures exactly that, and [`MemoryModel`] is a
//! plain implementation of it.

use std::collections::BTreeMap;

use crate::error::{ModelError, StorageResult};

/// Model sections that hold persisted rules.
pub const POLICY_SECTIONS: [&str; 2] = ["p", "g"];

/// An in-memory policy model.
pub trait PolicyModel: Send + Sync {
    /// Adds a rule (values only, without the ptype) to `sec`/`ptype`.
    ///
    /// Returns false if the rule was already present.
    fn add_policy(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> StorageResult<bool>;

    /// Returns true if the rule is present in `sec`/`ptype`.
    fn has_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> bool;

    /// Returns the rules of every ptype in `sec`.
    fn policies(&self, sec: &str) -> Vec<(String, Vec<Vec<String>>)>;

    /// Removes every rule from the model.
    fn clear_policy(&mut self);

    /// Loads a full rule line `[ptype, v0, ...]` into the model.
    ///
    /// The section is the first character of the ptype. Lines already in
    /// the model are skipped.
    fn load_policy_line(&mut self, line: &[String]) -> StorageResult<()> {
        let Some((ptype, values)) = line.split_first() else {
            return Err(ModelError::EmptyLine.into());
        };
        let Some(first) = ptype.chars().next() else {
            return Err(ModelError::EmptyLine.into());
        };
        let sec = &ptype[..first.len_utf8()];
        if self.has_policy(sec, ptype, values) {
            return Ok(());
        }
        self.add_policy(sec, ptype, values.to_vec())?;
        Ok(())
    }
}

/// A model holding rules in insertion order per section and ptype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryModel {
    sections: BTreeMap<String, BTreeMap<String, Vec<Vec<String>>>>,
}

impl MemoryModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules stored under `sec`/`ptype`.
    pub fn get_policy(&self, sec: &str, ptype: &str) -> &[Vec<String>] {
        self.sections
            .get(sec)
            .and_then(|ptypes| ptypes.get(ptype))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Removes a rule from `sec`/`ptype`, returning whether it was present.
    pub fn remove_policy(&mut self, sec: &str, ptype: &str, rule: &[String]) -> bool {
        let Some(rules) = self
            .sections
            .get_mut(sec)
            .and_then(|ptypes| ptypes.get_mut(ptype))
        else {
            return false;
        };
        let before = rules.len();
        rules.retain(|existing| existing.as_slice() != rule);
        rules.len() != before
    }

    /// Returns every rule as a full line `[ptype, v0, ...]`.
    pub fn lines(&self) -> Vec<Vec<String>> {
        self.sections
            .values()
            .flat_map(|ptypes| ptypes.iter())
            .flat_map(|(ptype, rules)| {
                rules.iter().map(move |rule| {
                    let mut line = Vec::with_capacity(rule.len() + 1);
                    line.push(ptype.clone());
                    line.extend(rule.iter().cloned());
                    line
                })
            })
            .collect()
    }

    /// Returns the total number of rules.
    pub fn len(&self) -> usize {
        self.sections
            .values()
            .flat_map(|ptypes| ptypes.values())
            .map(Vec::len)
            .sum()
    }

    /// Returns true if the model holds no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PolicyModel for MemoryModel {
    fn add_policy(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> StorageResult<bool> {
        if !POLICY_SECTIONS.contains(&sec) {
            return Err(ModelError::UnknownSection {
                section: sec.to_string(),
                ptype: ptype.to_string(),
            }
            .into());
        }
        let rules = self
            .sections
            .entry(sec.to_string())
            .or_default()
            .entry(ptype.to_string())
            .or_default();
        if rules.contains(&rule) {
            return Ok(false);
        }
        rules.push(rule);
        Ok(true)
    }

    fn has_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> bool {
        self.get_policy(sec, ptype)
            .iter()
            .any(|existing| existing.as_slice() == rule)
    }

    fn policies(&self, sec: &str) -> Vec<(String, Vec<Vec<String>>)> {
        self.sections
            .get(sec)
            .map(|ptypes| {
                ptypes
                    .iter()
                    .map(|(ptype, rules)| (ptype.clone(), rules.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn clear_policy(&mut self) {
        self.sections.clear();
    }
}
