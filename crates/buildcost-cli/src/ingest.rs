//! Build CSV loading
//!
//! Header names are matched case-insensitively after trimming. Every attribute
//! of the set needs its own column, next to a `height` column; `overall` (or
//! `ovr`), a total cost column and `position` are optional. Rows that cannot be
//! turned into a [`BuildRecord`] are counted and skipped, never fatal.

use std::{fs::File, io, path::Path};

use anyhow::Context;
use buildcost_model::{AttributeSet, BuildRecord, parse_height};

pub const DEFAULT_TOTAL_CONSTANT: f64 = 100_000.0;

const OVERALL_HEADERS: [&str; 2] = ["overall", "ovr"];
const TOTAL_COST_HEADERS: [&str; 3] = ["totalweight", "total_weight", "total weight"];

/// Which value of a row becomes the fitted target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetKind {
    /// The overall rating
    #[default]
    Rating,
    /// The total cost column, or the total constant when the file has none
    TotalCost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOptions {
    pub target: TargetKind,
    /// Total cost assumed for every build when the file has no total cost column
    pub total_constant: f64,
}

impl IngestOptions {
    /// Options for pricing builds, where every row is kept whatever its rating.
    #[must_use]
    pub fn total_cost() -> Self {
        Self {
            target: TargetKind::TotalCost,
            ..Self::default()
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            target: TargetKind::default(),
            total_constant: DEFAULT_TOTAL_CONSTANT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum DropReason {
    #[display("bad height {_0:?}")]
    Height(String),
    #[display("bad {attribute} value {value:?}")]
    Attribute { attribute: String, value: String },
    #[display("bad overall {_0:?}")]
    Overall(String),
    #[display("bad total cost {_0:?}")]
    TotalCost(String),
    #[display("no overall rating to use as target")]
    NoTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRow {
    /// 1-based line number in the file
    pub line: u64,
    pub reason: DropReason,
}

#[derive(Debug, Clone)]
pub struct LoadedBuilds {
    pub records: Vec<BuildRecord>,
    pub dropped: Vec<DroppedRow>,
}

impl LoadedBuilds {
    /// Keeps only builds with the given overall rating.
    pub fn retain_overall(&mut self, overall: u32) {
        self.records.retain(|r| r.overall == Some(overall));
    }

    pub fn report_dropped(&self) {
        const SHOWN: usize = 5;
        if self.dropped.is_empty() {
            return;
        }
        eprintln!("warning: skipped {} malformed rows", self.dropped.len());
        for row in self.dropped.iter().take(SHOWN) {
            eprintln!("  line {}: {}", row.line, row.reason);
        }
        if self.dropped.len() > SHOWN {
            eprintln!("  ...");
        }
    }
}

#[derive(Debug)]
struct Columns {
    height: usize,
    attributes: Vec<usize>,
    overall: Option<usize>,
    total_cost: Option<usize>,
    position: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, attributes: &AttributeSet) -> anyhow::Result<Self> {
        let height = find_column(headers, &["height"]).context("Missing column: height")?;
        let attributes = attributes
            .iter()
            .map(|name| {
                find_column(headers, &[name]).with_context(|| format!("Missing column: {name}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            height,
            attributes,
            overall: find_column(headers, &OVERALL_HEADERS),
            total_cost: find_column(headers, &TOTAL_COST_HEADERS),
            position: find_column(headers, &["position"]),
        })
    }

    fn parse(
        &self,
        row: &csv::StringRecord,
        attributes: &AttributeSet,
        options: &IngestOptions,
    ) -> Result<BuildRecord, DropReason> {
        let cell = |index: usize| row.get(index).unwrap_or("").trim();

        let height_cell = cell(self.height);
        let height =
            parse_height(height_cell).map_err(|_| DropReason::Height(height_cell.to_owned()))?;

        let values = attributes
            .iter()
            .zip(&self.attributes)
            .map(|(name, &index)| {
                let value = cell(index);
                value
                    .parse::<u32>()
                    .map(|v| (name, v))
                    .map_err(|_| DropReason::Attribute {
                        attribute: name.to_owned(),
                        value: value.to_owned(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let overall = match self.overall.map(cell).filter(|s| !s.is_empty()) {
            Some(s) => Some(
                s.parse::<u32>()
                    .map_err(|_| DropReason::Overall(s.to_owned()))?,
            ),
            None => None,
        };
        let total_cost = match self.total_cost.map(cell).filter(|s| !s.is_empty()) {
            Some(s) => Some(
                s.parse::<f64>()
                    .map_err(|_| DropReason::TotalCost(s.to_owned()))?,
            ),
            None => None,
        };

        let target = match options.target {
            TargetKind::TotalCost => total_cost.unwrap_or(options.total_constant),
            TargetKind::Rating => f64::from(overall.ok_or(DropReason::NoTarget)?),
        };

        let mut record = BuildRecord::new(height, values, target);
        record.overall = overall;
        record.total_cost = total_cost;
        record.position = self
            .position
            .map(cell)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        Ok(record)
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Reads builds from CSV data.
pub fn load_builds<R>(
    reader: R,
    attributes: &AttributeSet,
    options: &IngestOptions,
) -> anyhow::Result<LoadedBuilds>
where
    R: io::Read,
{
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let columns = Columns::resolve(&headers, attributes)?;

    let mut records = Vec::new();
    let mut dropped = Vec::new();
    for row in reader.records() {
        let row = row.context("Failed to read CSV row")?;
        let line = row.position().map_or(0, csv::Position::line);
        match columns.parse(&row, attributes, options) {
            Ok(record) => records.push(record),
            Err(reason) => dropped.push(DroppedRow { line, reason }),
        }
    }

    Ok(LoadedBuilds { records, dropped })
}

/// Reads builds from a CSV file.
pub fn read_builds_file<P>(
    path: P,
    attributes: &AttributeSet,
    options: &IngestOptions,
) -> anyhow::Result<LoadedBuilds>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open builds file: {}", path.display()))?;
    load_builds(io::BufReader::new(file), attributes, options)
        .with_context(|| format!("Failed to load builds from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> AttributeSet {
        AttributeSet::new(["Close Shot", "Block"])
    }

    fn load(csv: &str, options: &IngestOptions) -> LoadedBuilds {
        load_builds(csv.as_bytes(), &attributes(), options).unwrap()
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let csv = "Position, HEIGHT ,close shot,BLOCK,OVR\nPG,6'8,60,70,99\n";
        let loaded = load(csv, &IngestOptions::default());
        assert_eq!(loaded.records.len(), 1);

        let record = &loaded.records[0];
        assert_eq!(record.group_key, 80);
        assert_eq!(record.value("Close Shot"), Some(60));
        assert_eq!(record.value("Block"), Some(70));
        assert_eq!(record.overall, Some(99));
        assert_eq!(record.position.as_deref(), Some("PG"));
        assert_eq!(record.target, 99.0);
    }

    #[test]
    fn test_total_cost_target() {
        let csv = "height,close shot,block,total weight\n80,60,70,1721.5\n80,61,70,\n";
        let loaded = load(csv, &IngestOptions::total_cost());
        assert_eq!(loaded.records[0].target, 1721.5);
        assert_eq!(loaded.records[0].total_cost, Some(1721.5));
        assert_eq!(loaded.records[1].target, DEFAULT_TOTAL_CONSTANT);
    }

    #[test]
    fn test_rating_is_the_default_target() {
        let csv = "height,close shot,block,overall,total weight\n\
                   80,60,70,97,1721\n\
                   80,60,70,,1721\n";
        let loaded = load(csv, &IngestOptions::default());
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].target, 97.0);
        assert_eq!(loaded.dropped[0].reason, DropReason::NoTarget);
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let csv = "height,close shot,block\n\
                   tall,60,70\n\
                   80,sixty,70\n\
                   80,60\n\
                   6-9,60,70\n";
        let loaded = load(csv, &IngestOptions::total_cost());
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].group_key, 81);

        let reasons = loaded
            .dropped
            .iter()
            .map(|d| (d.line, d.reason.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            reasons,
            vec![
                (2, DropReason::Height("tall".to_owned())),
                (
                    3,
                    DropReason::Attribute {
                        attribute: "Close Shot".to_owned(),
                        value: "sixty".to_owned(),
                    }
                ),
                (
                    4,
                    DropReason::Attribute {
                        attribute: "Block".to_owned(),
                        value: String::new(),
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_missing_attribute_column_is_an_error() {
        let csv = "height,close shot\n80,60\n";
        let err = load_builds(csv.as_bytes(), &attributes(), &IngestOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Block"));
    }

    #[test]
    fn test_retain_overall() {
        let csv = "height,close shot,block,overall\n80,60,70,99\n80,60,70,98\n80,60,70,\n";
        let mut loaded = load(csv, &IngestOptions::default());
        loaded.retain_overall(99);
        assert_eq!(loaded.records.len(), 1);
    }
}
