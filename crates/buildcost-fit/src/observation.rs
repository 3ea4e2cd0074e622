//! Design matrix construction.
//!
//! Every (attribute, value) pair inside the optimized window gets one column of
//! the design matrix. A build sets exactly one column per attribute: the column of
//! the value it has (one-hot, not cumulative). The fitted weight of column
//! `(a, v)` is then the model's share of the build total owed to attribute `a`
//! sitting at value `v`.

use std::ops::Range;

use buildcost_model::{AttributeSet, BuildRecord, ValueRange};

/// Bijection between (attribute index, value) pairs and dense column indices.
///
/// Columns of one attribute are contiguous and ordered by increasing value:
/// `column = attribute * window.len() + (value - window.min())`.
///
/// # Example
///
/// ```
/// use buildcost_fit::observation::ParameterIndex;
/// use buildcost_model::ValueRange;
///
/// let index = ParameterIndex::new(3, ValueRange::new(25, 99));
/// assert_eq!(index.len(), 3 * 75);
/// assert_eq!(index.column(1, 25), Some(75));
/// assert_eq!(index.parameter(75), Some((1, 25)));
/// assert_eq!(index.column(1, 100), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterIndex {
    attribute_count: usize,
    window: ValueRange,
}

impl ParameterIndex {
    #[must_use]
    pub fn new(attribute_count: usize, window: ValueRange) -> Self {
        Self {
            attribute_count,
            window,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attribute_count * self.window.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attribute_count == 0
    }

    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    #[must_use]
    pub fn window(&self) -> ValueRange {
        self.window
    }

    /// Column of `(attribute, value)`, or `None` if either is out of range.
    #[must_use]
    pub fn column(&self, attribute: usize, value: u32) -> Option<usize> {
        if attribute >= self.attribute_count {
            return None;
        }
        let offset = self.window.offset(value)?;
        Some(attribute * self.window.len() + offset)
    }

    /// Inverse of [`column`](Self::column).
    #[must_use]
    pub fn parameter(&self, column: usize) -> Option<(usize, u32)> {
        let attribute = column / self.window.len();
        if attribute >= self.attribute_count {
            return None;
        }
        let value = self.window.value_at(column % self.window.len())?;
        Some((attribute, value))
    }

    /// The contiguous columns of one attribute, ordered by increasing value.
    #[must_use]
    pub fn attribute_columns(&self, attribute: usize) -> Range<usize> {
        let start = attribute * self.window.len();
        start..start + self.window.len()
    }
}

/// One-hot design matrix stored as the list of hot columns of each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignMatrix {
    column_count: usize,
    rows: Vec<Vec<usize>>,
}

impl DesignMatrix {
    #[must_use]
    pub fn new(column_count: usize, rows: Vec<Vec<usize>>) -> Self {
        assert!(
            rows.iter().flatten().all(|&c| c < column_count),
            "hot column out of range"
        );
        Self { column_count, rows }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Hot columns of row `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> &[usize] {
        &self.rows[row]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Computes `X · weights`.
    #[must_use]
    pub fn predict(&self, weights: &[f64]) -> Vec<f64> {
        assert_eq!(weights.len(), self.column_count);
        self.rows
            .iter()
            .map(|row| row.iter().map(|&c| weights[c]).sum())
            .collect()
    }

    /// Entry `(row, column)` of the dense matrix.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> f64 {
        if self.rows[row].contains(&column) {
            1.0
        } else {
            0.0
        }
    }
}

/// Design matrix and targets of all builds sharing one group key.
#[derive(Debug, Clone)]
pub struct ObservationSet {
    group_key: u32,
    index: ParameterIndex,
    design: DesignMatrix,
    targets: Vec<f64>,
}

impl ObservationSet {
    /// Builds the observations for `group_key`.
    ///
    /// Returns `None` if no record belongs to the group. Attribute values outside
    /// `window` leave that attribute without a hot column, but the build still
    /// contributes a row.
    #[must_use]
    pub fn build(
        records: &[BuildRecord],
        group_key: u32,
        attributes: &AttributeSet,
        window: ValueRange,
    ) -> Option<Self> {
        let index = ParameterIndex::new(attributes.len(), window);
        let (rows, targets): (Vec<_>, Vec<_>) = records
            .iter()
            .filter(|record| record.group_key == group_key)
            .map(|record| {
                let hot = attributes
                    .iter()
                    .enumerate()
                    .filter_map(|(i, name)| index.column(i, record.value(name)?))
                    .collect::<Vec<_>>();
                (hot, record.target)
            })
            .unzip();

        if rows.is_empty() {
            return None;
        }

        Some(Self {
            group_key,
            index,
            design: DesignMatrix::new(index.len(), rows),
            targets,
        })
    }

    #[must_use]
    pub fn group_key(&self) -> u32 {
        self.group_key
    }

    #[must_use]
    pub fn index(&self) -> &ParameterIndex {
        &self.index
    }

    #[must_use]
    pub fn design(&self) -> &DesignMatrix {
        &self.design
    }

    #[must_use]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Number of builds (rows).
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Whether every target lies within `tolerance` of the first.
    #[must_use]
    pub fn targets_constant(&self, tolerance: f64) -> bool {
        let Some(&first) = self.targets.first() else {
            return true;
        };
        self.targets.iter().all(|y| (y - first).abs() <= tolerance)
    }
}

/// Distinct group keys of `records`, in ascending order.
#[must_use]
pub fn group_keys(records: &[BuildRecord]) -> Vec<u32> {
    let mut keys = records.iter().map(|r| r.group_key).collect::<Vec<_>>();
    keys.sort_unstable();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> AttributeSet {
        AttributeSet::new(["A", "B"])
    }

    #[test]
    fn test_parameter_index_is_bijective() {
        let index = ParameterIndex::new(4, ValueRange::new(30, 40));
        assert_eq!(index.len(), 44);
        for column in 0..index.len() {
            let (attribute, value) = index.parameter(column).unwrap();
            assert_eq!(index.column(attribute, value), Some(column));
        }
        assert_eq!(index.parameter(44), None);
        assert_eq!(index.column(4, 30), None);
    }

    #[test]
    fn test_one_hot_encoding() {
        let records = [
            BuildRecord::new(80, [("A", 30), ("B", 99)], 99.0),
            BuildRecord::new(80, [("A", 40), ("B", 25)], 98.0),
            BuildRecord::new(81, [("A", 50), ("B", 50)], 97.0),
        ];
        let obs = ObservationSet::build(&records, 80, &attributes(), ValueRange::DISPLAY).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs.targets(), &[99.0, 98.0]);
        assert_eq!(obs.design().column_count(), 150);

        let index = obs.index();
        assert_eq!(
            obs.design().row(0),
            &[index.column(0, 30).unwrap(), index.column(1, 99).unwrap()]
        );
        assert_eq!(obs.design().get(1, index.column(0, 40).unwrap()), 1.0);
        assert_eq!(obs.design().get(1, index.column(0, 39).unwrap()), 0.0);
    }

    #[test]
    fn test_missing_group_yields_none() {
        let records = [BuildRecord::new(80, [("A", 30)], 99.0)];
        assert!(ObservationSet::build(&records, 70, &attributes(), ValueRange::DISPLAY).is_none());
    }

    #[test]
    fn test_out_of_window_values_keep_row() {
        let records = [BuildRecord::new(80, [("A", 30), ("B", 90)], 99.0)];
        let obs =
            ObservationSet::build(&records, 80, &attributes(), ValueRange::new(60, 95)).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs.design().row(0).len(), 1);
    }

    #[test]
    fn test_predict() {
        let design = DesignMatrix::new(4, vec![vec![0, 2], vec![1, 3], vec![]]);
        assert_eq!(design.predict(&[1.0, 2.0, 3.0, 4.0]), vec![4.0, 6.0, 0.0]);
    }

    #[test]
    fn test_group_keys_sorted_unique() {
        let records = [
            BuildRecord::new(82, [("A", 30)], 1.0),
            BuildRecord::new(78, [("A", 30)], 1.0),
            BuildRecord::new(82, [("A", 31)], 1.0),
        ];
        assert_eq!(group_keys(&records), vec![78, 82]);
    }
}
