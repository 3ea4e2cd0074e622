//! Projection of a previously computed weight table onto a parameter index.
//!
//! A prior is a best-effort warm start: a missing table or a missing group simply
//! means "no prior". Callers reading the table from disk are expected to fold
//! their own I/O and decode failures into `None` as well.

use buildcost_model::{AttributeSet, ValueRange, WeightTable};

use crate::observation::ParameterIndex;

/// Projects the prior table's weights for `group_key` onto `index`.
///
/// Entries the prior does not know (missing attribute, `null`, or past the end of
/// the stored sequence) are zero. Stored sequences are laid out over `display`.
///
/// Returns `None` if there is no table or the table has no entry for `group_key`.
#[must_use]
pub fn prior_vector(
    table: Option<&WeightTable>,
    group_key: u32,
    attributes: &AttributeSet,
    index: &ParameterIndex,
    display: ValueRange,
) -> Option<Vec<f64>> {
    let group = table?.group(group_key)?;
    let mut prior = vec![0.0; index.len()];

    for (attribute, name) in attributes.iter().enumerate() {
        let Some(weights) = group.attribute(name) else {
            continue;
        };
        for value in index.window().values() {
            let Some(column) = index.column(attribute, value) else {
                continue;
            };
            if let Some(Some(weight)) = display.offset(value).and_then(|i| weights.get(i)) {
                prior[column] = *weight;
            }
        }
    }

    Some(prior)
}
