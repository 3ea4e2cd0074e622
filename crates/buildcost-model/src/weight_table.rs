use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AttributeSet, BuildRecord, ValueRange};

/// Per-value weights of one attribute over the [display range](ValueRange::DISPLAY).
///
/// Entry `i` is the cost of raising the attribute from `25 + i - 1` to `25 + i`;
/// `None` marks a value whose cost is unknown.
pub type AttributeWeights = Vec<Option<f64>>;

/// Weights of every attribute for one group key (height).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupWeights {
    attributes: BTreeMap<String, AttributeWeights>,
}

impl GroupWeights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S>(&mut self, name: S, weights: AttributeWeights)
    where
        S: Into<String>,
    {
        self.attributes.insert(name.into(), weights);
    }

    /// Weights of the attribute called `name`, ignoring ASCII case.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[Option<f64>]> {
        if let Some(weights) = self.attributes.get(name) {
            return Some(weights);
        }
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, w)| w.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> + '_ {
        self.attributes
            .iter()
            .map(|(name, weights)| (name.as_str(), weights.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut AttributeWeights)> + '_ {
        self.attributes
            .iter_mut()
            .map(|(name, weights)| (name.as_str(), weights))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Cumulative cost of the attribute called `name` at `value`.
    ///
    /// Returns `None` if the group has no weights for that attribute.
    #[must_use]
    pub fn cumulative_cost(&self, name: &str, value: u32) -> Option<f64> {
        self.attribute(name)
            .map(|weights| cumulative_cost(weights, value))
    }
}

/// Lookup policy for builds whose height has no entry in the table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GroupLookup {
    /// Only an exact height match is used.
    #[default]
    Exact,
    /// Fall back to the closest known height.
    Nearest,
}

/// The persisted weight table: group key → attribute → per-value weights.
///
/// Serialized as a JSON object keyed by the stringified group key:
///
/// ```
/// use buildcost_model::WeightTable;
///
/// let json = r#"{ "80": { "Block": [0, 12, null] } }"#;
/// let table: WeightTable = serde_json::from_str(json).unwrap();
/// let block = table.group(80).unwrap().attribute("block").unwrap();
/// assert_eq!(block, &[Some(0.0), Some(12.0), None]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    groups: BTreeMap<u32, GroupWeights>,
}

impl WeightTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group_key: u32, weights: GroupWeights) {
        self.groups.insert(group_key, weights);
    }

    #[must_use]
    pub fn group(&self, group_key: u32) -> Option<&GroupWeights> {
        self.groups.get(&group_key)
    }

    pub fn group_mut(&mut self, group_key: u32) -> &mut GroupWeights {
        self.groups.entry(group_key).or_default()
    }

    pub fn groups(&self) -> impl Iterator<Item = (u32, &GroupWeights)> + '_ {
        self.groups.iter().map(|(key, weights)| (*key, weights))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The known group key closest to `group_key`; ties go to the lower key.
    #[must_use]
    pub fn nearest_group_key(&self, group_key: u32) -> Option<u32> {
        self.groups
            .keys()
            .copied()
            .min_by_key(|key| (key.abs_diff(group_key), *key))
    }

    /// Looks up the weights for `group_key` under the given policy.
    #[must_use]
    pub fn lookup(&self, group_key: u32, lookup: GroupLookup) -> Option<&GroupWeights> {
        match lookup {
            GroupLookup::Exact => self.group(group_key),
            GroupLookup::Nearest => self
                .nearest_group_key(group_key)
                .and_then(|key| self.group(key)),
        }
    }

    /// Total cost of a build: the sum of the cumulative cost of each attribute.
    ///
    /// Attributes the group has no weights for contribute nothing. Returns `None`
    /// if no group matches the build's height.
    #[must_use]
    pub fn build_cost(
        &self,
        build: &BuildRecord,
        attributes: &AttributeSet,
        lookup: GroupLookup,
    ) -> Option<f64> {
        let group = self.lookup(build.group_key, lookup)?;
        let total = attributes
            .iter()
            .filter_map(|name| group.cumulative_cost(name, build.value(name)?))
            .sum();
        Some(total)
    }

    /// Pads or trims every sequence to the display range and zeroes the first entry.
    ///
    /// The first entry corresponds to the minimum slider value, which costs nothing
    /// by convention.
    pub fn normalize(&mut self) {
        let len = ValueRange::DISPLAY.len();
        for group in self.groups.values_mut() {
            for (_, weights) in group.iter_mut() {
                weights.resize(len, None);
                weights[0] = Some(0.0);
            }
        }
    }
}

/// Sums the known weights from the display minimum up to and including `value`.
///
/// # Example
///
/// ```
/// use buildcost_model::weight_table::cumulative_cost;
///
/// let weights = [Some(0.0), Some(10.0), None, Some(15.0)];
/// assert_eq!(cumulative_cost(&weights, 25), 0.0);
/// assert_eq!(cumulative_cost(&weights, 27), 10.0);
/// assert_eq!(cumulative_cost(&weights, 99), 25.0);
/// ```
#[must_use]
pub fn cumulative_cost(weights: &[Option<f64>], value: u32) -> f64 {
    let Some(end) = value.checked_sub(ValueRange::DISPLAY.min()) else {
        return 0.0;
    };
    weights
        .iter()
        .take(end as usize + 1)
        .flatten()
        .sum()
}

/// The range of values whose weight is known, from the first to the last
/// non-null entry.
#[must_use]
pub fn known_bounds(weights: &[Option<f64>]) -> Option<ValueRange> {
    let first = weights.iter().position(Option::is_some)?;
    let last = weights.iter().rposition(Option::is_some)?;
    let display = ValueRange::DISPLAY;
    Some(ValueRange::new(
        display.value_at(first)?,
        display.value_at(last)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> WeightTable {
        let mut group = GroupWeights::new();
        group.insert("Close Shot", vec![Some(0.0), Some(5.0), Some(7.0)]);
        group.insert("Block", vec![Some(0.0), None, Some(3.0)]);
        let mut table = WeightTable::new();
        table.insert(80, group.clone());
        table.insert(76, group);
        table
    }

    #[test]
    fn test_json_keys_are_stringified_group_keys() {
        let table = sample_table();
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.get("80").is_some());
        assert!(json.get("76").is_some());
        assert_eq!(json["80"]["Block"][1], serde_json::Value::Null);

        let back: WeightTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_build_cost_exact_and_missing_group() {
        let table = sample_table();
        let attributes = AttributeSet::new(["Close Shot", "Block", "Steal"]);
        let build = BuildRecord::new(80, [("Close Shot", 27), ("Block", 27), ("Steal", 60)], 0.0);
        assert_eq!(
            table.build_cost(&build, &attributes, GroupLookup::Exact),
            Some(15.0)
        );

        let build = BuildRecord::new(79, [("Close Shot", 27)], 0.0);
        assert_eq!(table.build_cost(&build, &attributes, GroupLookup::Exact), None);
        assert_eq!(
            table.build_cost(&build, &attributes, GroupLookup::Nearest),
            Some(12.0)
        );
    }

    #[test]
    fn test_nearest_group_key_prefers_lower_on_tie() {
        let table = sample_table();
        assert_eq!(table.nearest_group_key(78), Some(76));
        assert_eq!(table.nearest_group_key(79), Some(80));
        assert_eq!(table.nearest_group_key(90), Some(80));
        assert_eq!(WeightTable::new().nearest_group_key(80), None);
    }

    #[test]
    fn test_cumulative_cost_below_display_minimum() {
        assert_eq!(cumulative_cost(&[Some(4.0)], 10), 0.0);
    }

    #[test]
    fn test_known_bounds() {
        let weights = [None, Some(1.0), None, Some(2.0), None];
        assert_eq!(known_bounds(&weights), Some(ValueRange::new(26, 28)));
        assert_eq!(known_bounds(&[None, None]), None);
    }

    #[test]
    fn test_normalize_pads_and_zeroes_first_entry() {
        let mut table = sample_table();
        table.normalize();
        let block = table.group(80).unwrap().attribute("Block").unwrap();
        assert_eq!(block.len(), 75);
        assert_eq!(block[0], Some(0.0));
        assert_eq!(block[2], Some(3.0));
        assert_eq!(block[74], None);
    }
}
