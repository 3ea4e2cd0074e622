//! Merging optimized weights back into a full display-range table.

use buildcost_model::{AttributeSet, GroupWeights, ValueRange};

use crate::observation::ParameterIndex;

/// Lays the optimized `weights` out over the `display` range.
///
/// - Inside the optimized window each entry is the optimized weight rounded to the
///   nearest integer (ties to even), except the window minimum which is always 0.
/// - Outside the window each entry is taken from `prior` when it knows the
///   attribute and value, and is `None` otherwise.
///
/// # Panics
///
/// Panics if `weights` does not match `index` or the window is not contained in
/// `display`.
///
/// # Example
///
/// ```
/// use buildcost_fit::{assemble::assemble, observation::ParameterIndex};
/// use buildcost_model::{AttributeSet, ValueRange};
///
/// let index = ParameterIndex::new(1, ValueRange::new(25, 27));
/// let attributes = AttributeSet::new(["Block"]);
/// let group = assemble(&[7.0, 2.5, 3.5], &index, &attributes, None, ValueRange::DISPLAY);
///
/// let block = group.attribute("Block").unwrap();
/// assert_eq!(block.len(), 75);
/// assert_eq!(&block[..4], &[Some(0.0), Some(2.0), Some(4.0), None]);
/// ```
#[must_use]
pub fn assemble(
    weights: &[f64],
    index: &ParameterIndex,
    attributes: &AttributeSet,
    prior: Option<&GroupWeights>,
    display: ValueRange,
) -> GroupWeights {
    assert_eq!(weights.len(), index.len());
    let window = index.window();
    assert!(
        display.contains_range(window),
        "optimized window must lie inside the display range"
    );

    let mut group = GroupWeights::new();
    for (attribute, name) in attributes.iter().enumerate() {
        let prior_weights = prior.and_then(|p| p.attribute(name));
        let sequence = display
            .values()
            .map(|value| {
                if value == window.min() {
                    return Some(0.0);
                }
                if let Some(column) = index.column(attribute, value) {
                    return Some(weights[column].round_ties_even());
                }
                let offset = display.offset(value)?;
                prior_weights.and_then(|p| p.get(offset).copied().flatten())
            })
            .collect();
        group.insert(name, sequence);
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_prior() -> GroupWeights {
        let mut prior = GroupWeights::new();
        #[expect(clippy::cast_precision_loss)]
        let sequence = (0..75).map(|i| Some(i as f64 * 1.5)).collect();
        prior.insert("A", sequence);
        prior
    }

    #[test]
    fn test_single_entry_window_keeps_prior_elsewhere() {
        let prior = populated_prior();
        let attributes = AttributeSet::new(["A"]);
        let index = ParameterIndex::new(1, ValueRange::new(60, 60));
        let group = assemble(&[0.0], &index, &attributes, Some(&prior), ValueRange::DISPLAY);

        let original = prior.attribute("A").unwrap();
        let merged = group.attribute("A").unwrap();
        assert_eq!(merged.len(), 75);
        for (i, (m, o)) in merged.iter().zip(original).enumerate() {
            if i == 35 {
                assert_eq!(*m, Some(0.0));
            } else {
                assert_eq!(m, o, "entry {i}");
            }
        }
    }

    #[test]
    fn test_rounds_half_to_even() {
        let attributes = AttributeSet::new(["A"]);
        let index = ParameterIndex::new(1, ValueRange::new(25, 29));
        let group = assemble(
            &[9.0, 0.5, 1.5, 2.5, 2.49],
            &index,
            &attributes,
            None,
            ValueRange::DISPLAY,
        );
        let a = group.attribute("A").unwrap();
        assert_eq!(
            &a[..6],
            &[Some(0.0), Some(0.0), Some(2.0), Some(2.0), Some(2.0), None]
        );
    }

    #[test]
    fn test_without_prior_outside_is_unknown() {
        let attributes = AttributeSet::new(["A", "B"]);
        let index = ParameterIndex::new(2, ValueRange::new(90, 99));
        let weights = vec![10.0; index.len()];
        let group = assemble(&weights, &index, &attributes, None, ValueRange::DISPLAY);

        for name in ["A", "B"] {
            let seq = group.attribute(name).unwrap();
            assert!(seq[..65].iter().all(Option::is_none));
            assert_eq!(seq[65], Some(0.0));
            assert!(seq[66..].iter().all(|w| *w == Some(10.0)));
        }
    }

    #[test]
    fn test_prior_missing_attribute_and_nulls() {
        let mut prior = GroupWeights::new();
        prior.insert("A", vec![Some(0.0), None, Some(4.0)]);
        let attributes = AttributeSet::new(["A", "B"]);
        let index = ParameterIndex::new(2, ValueRange::new(50, 51));
        let group = assemble(&[0.0; 4], &index, &attributes, Some(&prior), ValueRange::DISPLAY);

        let a = group.attribute("A").unwrap();
        assert_eq!(&a[..4], &[Some(0.0), None, Some(4.0), None]);
        assert!(group.attribute("B").unwrap()[..25].iter().all(Option::is_none));
    }
}
