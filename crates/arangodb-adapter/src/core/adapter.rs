//! The contract between a policy enforcer and its storage adapter.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::filter::BatchFilter;
use crate::model::PolicyModel;

/// Persists policy rules on behalf of an enforcer.
///
/// `sec` is the model section (`p` or `g`) and `ptype` the policy type
/// (`p`, `p2`, `g`, ...). Rules are passed without their ptype.
///
/// All methods take `&self` so one adapter can serve concurrent callers.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Loads every stored rule into `model` and clears the filtered flag.
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> StorageResult<()>;

    /// Loads only rules matching `filter` and marks the adapter as filtered.
    ///
    /// An empty batch falls back to [`load_policy`](Self::load_policy).
    async fn load_filtered_policy(
        &self,
        model: &mut dyn PolicyModel,
        filter: BatchFilter,
    ) -> StorageResult<()>;

    /// Returns true once a filtered load has run, meaning the model does not
    /// hold every stored rule and a full save would drop rules.
    fn is_filtered(&self) -> bool;

    /// Replaces all stored rules with the rules of `model`.
    async fn save_policy(&self, model: &dyn PolicyModel) -> StorageResult<()>;

    /// Removes every stored rule.
    async fn clear_policy(&self) -> StorageResult<()>;

    /// Stores one rule.
    async fn add_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> StorageResult<()>;

    /// Stores several rules.
    async fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> StorageResult<()>;

    /// Removes the rules matching `rule`'s non-empty values.
    async fn remove_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> StorageResult<()>;

    /// Removes several rules, one after another.
    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> StorageResult<()>;

    /// Removes rules whose values starting at `field_index` equal
    /// `field_values`.
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> StorageResult<()>;

    /// Rewrites the rules matching `old_rule` to `new_rule`.
    async fn update_policy(
        &self,
        sec: &str,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> StorageResult<()>;

    /// Rewrites `old_rules[i]` to `new_rules[i]` for every `i`.
    async fn update_policies(
        &self,
        sec: &str,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> StorageResult<()>;

    /// Stores `new_rules` for a filter update and returns the replaced rules.
    async fn update_filtered_policies(
        &self,
        sec: &str,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> StorageResult<Vec<Vec<String>>>;
}
