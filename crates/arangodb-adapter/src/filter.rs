//! Filters for partial policy loads.

use serde::{Deserialize, Serialize};

use crate::rule::RuleField;

/// Selects rules by the values of their fields.
///
/// Each field holds the list of acceptable values. An empty list leaves the
/// field unconstrained, so `Filter::default()` matches every rule. A rule
/// matches when every constrained field holds one of its listed values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Filter {
    #[serde(default)]
    pub ptype: Vec<String>,
    #[serde(default)]
    pub v0: Vec<String>,
    #[serde(default)]
    pub v1: Vec<String>,
    #[serde(default)]
    pub v2: Vec<String>,
    #[serde(default)]
    pub v3: Vec<String>,
    #[serde(default)]
    pub v4: Vec<String>,
    #[serde(default)]
    pub v5: Vec<String>,
}

impl Filter {
    /// Creates an unconstrained filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to the given ptypes.
    pub fn ptype<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_field(RuleField::Ptype, values)
    }

    /// Restricts value field `index` (0 for `v0`) to the given values.
    ///
    /// Indexes past `v5` are ignored.
    pub fn value<I, S>(self, index: usize, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match RuleField::value(index) {
            Some(field) => self.with_field(field, values),
            None => self,
        }
    }

    /// Replaces the candidate list of `field`.
    pub fn with_field<I, S>(mut self, field: RuleField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.candidates_mut(field) = values.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the candidate list of `field`.
    pub fn candidates(&self, field: RuleField) -> &[String] {
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

    fn candidates_mut(&mut self, field: RuleField) -> &mut Vec<String> {
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

    /// Returns true if no field is constrained.
    pub fn is_unconstrained(&self) -> bool {
        RuleField::ALL
            .iter()
            .all(|field| self.candidates(*field).is_empty())
    }
}

/// Several filters applied one after another.
///
/// Each filter runs as its own query and all matching rules are loaded, so
/// rules are OR-ed across filters and AND-ed within a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFilter {
    filters: Vec<Filter>,
}

impl BatchFilter {
    /// Creates a batch from a list of filters.
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    /// Appends a filter to the batch.
    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// Returns the filters in this batch.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Returns true if the batch holds no filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl From<Filter> for BatchFilter {
    fn from(filter: Filter) -> Self {
        Self::new(vec![filter])
    }
}

impl From<&Filter> for BatchFilter {
    fn from(filter: &Filter) -> Self {
        Self::new(vec![filter.clone()])
    }
}

impl From<Vec<Filter>> for BatchFilter {
    fn from(filters: Vec<Filter>) -> Self {
        Self::new(filters)
    }
}

impl FromIterator<Filter> for BatchFilter {
    fn from_iter<T: IntoIterator<Item = Filter>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
