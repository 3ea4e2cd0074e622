//! Domain model for build cost tables.
//!
//! A *build* is one character configuration: a height (the group key) and an
//! integer value for each of a fixed set of attributes. The game charges a hidden
//! per-attribute, per-value cost for every point spent; the [`WeightTable`] is our
//! reconstruction of that table, one sequence of per-value weights per attribute
//! and height.
//!
//! - [`attribute`]: the attribute name set and integer value ranges
//! - [`build`]: observed build records
//! - [`height`]: height string parsing (`6'8"` → 80 inches)
//! - [`weight_table`]: the persisted weight table and cumulative cost lookups

pub use self::{
    attribute::{AttributeSet, ValueRange},
    build::BuildRecord,
    height::{HeightParseError, parse_height},
    weight_table::{AttributeWeights, GroupLookup, GroupWeights, WeightTable},
};

pub mod attribute;
pub mod build;
pub mod height;
pub mod weight_table;
