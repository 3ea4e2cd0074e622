use std::collections::BTreeMap;

/// One observed character configuration.
///
/// Builds are only compared with other builds of the same [`group_key`](Self::group_key)
/// (the height in inches). The [`target`](Self::target) is whatever aggregate the
/// caller wants the fitted weights to explain, usually the overall rating or the
/// total cost reported by the game.
///
/// # Example
///
/// ```
/// use buildcost_model::BuildRecord;
///
/// let build = BuildRecord::new(80, [("Close Shot", 70), ("Block", 45)], 99.0);
/// assert_eq!(build.value("close shot"), Some(70));
/// assert_eq!(build.value("Steal"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRecord {
    pub group_key: u32,
    pub attributes: BTreeMap<String, u32>,
    pub target: f64,
    pub position: Option<String>,
    pub overall: Option<u32>,
    pub total_cost: Option<f64>,
}

impl BuildRecord {
    pub fn new<I, S>(group_key: u32, attributes: I, target: f64) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            group_key,
            attributes: attributes
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
            target,
            position: None,
            overall: None,
            total_cost: None,
        }
    }

    /// Value of the attribute called `name`, ignoring ASCII case.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<u32> {
        if let Some(value) = self.attributes.get(name) {
            return Some(*value);
        }
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}
