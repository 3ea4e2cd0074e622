use std::ops::RangeInclusive;

/// Attribute names used by the build editor, in display order.
pub const DEFAULT_ATTRIBUTES: [&str; 21] = [
    "Close Shot",
    "Driving Layup",
    "Driving Dunk",
    "Standing Dunk",
    "Post Control",
    "Mid Range Shot",
    "Three Point Shot",
    "Free Throw",
    "Pass Accuracy",
    "Ball Handle",
    "Speed with Ball",
    "Interior Defense",
    "Perimeter Defense",
    "Steal",
    "Block",
    "Offensive Rebound",
    "Defensive Rebound",
    "Speed",
    "Agility",
    "Strength",
    "Vertical",
];

/// An inclusive range of integer attribute values.
///
/// The [display range](Self::DISPLAY) is the full slider domain shown to users; fits
/// may optimize a narrower window inside it.
///
/// # Example
///
/// ```
/// use buildcost_model::ValueRange;
///
/// let window = ValueRange::new(60, 80);
/// assert_eq!(window.len(), 21);
/// assert_eq!(window.offset(60), Some(0));
/// assert_eq!(window.offset(81), None);
/// assert!(ValueRange::DISPLAY.contains_range(window));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRange {
    min: u32,
    max: u32,
}

impl ValueRange {
    /// The full slider domain, 25 through 99.
    pub const DISPLAY: Self = Self::new(25, 99);

    /// Creates a range covering `min..=max`.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        assert!(min <= max, "value range must not be empty");
        Self { min, max }
    }

    #[must_use]
    pub const fn min(self) -> u32 {
        self.min
    }

    #[must_use]
    pub const fn max(self) -> u32 {
        self.max
    }

    /// Number of integer values in the range.
    #[must_use]
    pub const fn len(self) -> usize {
        (self.max - self.min) as usize + 1
    }

    /// Always `false`; ranges hold at least one value.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        false
    }

    #[must_use]
    pub const fn contains(self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }

    #[must_use]
    pub const fn contains_range(self, other: Self) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    /// Zero-based position of `value` inside the range.
    #[must_use]
    pub const fn offset(self, value: u32) -> Option<usize> {
        if self.contains(value) {
            Some((value - self.min) as usize)
        } else {
            None
        }
    }

    /// Value at the zero-based position `offset`.
    #[must_use]
    pub fn value_at(self, offset: usize) -> Option<u32> {
        let value = self.min.checked_add(u32::try_from(offset).ok()?)?;
        self.contains(value).then_some(value)
    }

    #[must_use]
    pub const fn values(self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

/// The ordered set of attribute names a build is made of.
///
/// Name lookups ignore ASCII case, since both CSV headers and stored tables are
/// written by hand and disagree on capitalization (`Speed with Ball` vs
/// `Speed With Ball`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSet {
    names: Vec<String>,
}

impl Default for AttributeSet {
    fn default() -> Self {
        Self::new(DEFAULT_ATTRIBUTES)
    }
}

impl AttributeSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Index of the attribute called `name`, ignoring ASCII case.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name.trim()))
    }
}
