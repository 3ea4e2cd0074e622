//! Recovery of per-value attribute weights from observed builds.
//!
//! Builds of the same height that share an overall rating are assumed to cost the
//! same in the hidden per-value table. For each height this crate finds
//! non-negative weights, one per (attribute, value) pair inside an optimized
//! window, that make those totals agree while staying monotone, smooth and close
//! to a prior table when one is supplied.
//!
//! # Pipeline
//!
//! 1. [`observation`]: one-hot design matrix and targets for a group
//! 2. [`prior`]: optional warm start projected from a previous table
//! 3. [`objective`] + [`penalty`]: the composite loss and its gradient
//! 4. [`solver`]: projected L-BFGS over the non-negative orthant
//! 5. [`assemble`]: rounding and merging back into a display-range table
//! 6. [`validation`]: prediction error diagnostics
//!
//! [`fit`] ties these together per group, and [`interaction`] fits a pairwise
//! correction on top of a finished table.
//!
//! # Example
//!
//! ```
//! use buildcost_fit::fit::{FitConfig, fit_groups};
//! use buildcost_model::{AttributeSet, BuildRecord};
//!
//! let records = [
//!     BuildRecord::new(80, [("Block", 30)], 99.0),
//!     BuildRecord::new(80, [("Block", 40)], 99.0),
//! ];
//! let config = FitConfig {
//!     attributes: AttributeSet::new(["Block"]),
//!     ..FitConfig::default()
//! };
//! let run = fit_groups(&records, None, &config).unwrap();
//! let block = run.table.group(80).unwrap().attribute("Block").unwrap();
//! assert_eq!(block.len(), 75);
//! assert_eq!(block[0], Some(0.0));
//! ```

pub mod assemble;
pub mod fit;
pub mod interaction;
pub mod objective;
pub mod observation;
pub mod penalty;
pub mod prior;
pub mod solver;
pub mod validation;
