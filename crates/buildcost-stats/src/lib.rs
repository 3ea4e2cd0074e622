//! Statistical helpers shared by the fitting core and the command line tools.
//!
//! - **Descriptive statistics**: min, max, mean, median, variance and standard deviation
//! - **Prediction error**: RMSE and percentage error of predictions against targets
//!
//! # Examples
//!
//! ## Summarizing build totals
//!
//! ```
//! use buildcost_stats::descriptive::DescriptiveStats;
//!
//! let totals = [1700.0, 1720.0, 1740.0];
//! let stats = DescriptiveStats::new(totals).unwrap();
//! assert_eq!(stats.mean, 1720.0);
//! assert_eq!(stats.median, 1720.0);
//! ```
//!
//! ## Scoring predictions
//!
//! ```
//! use buildcost_stats::error::PredictionError;
//!
//! let error = PredictionError::new(&[99.0, 101.0], &[100.0, 100.0]);
//! assert_eq!(error.rmse, 1.0);
//! assert_eq!(error.mean_percent, Some(1.0));
//! ```

pub mod descriptive;
pub mod error;
