//! Weight sheet conversion
//!
//! Two sheet layouts are understood:
//!
//! - **Long**: one row per (height, attribute, value) with a weight column.
//! - **Wide**: one row per (height, attribute); columns headed by a value
//!   (`99`) or a value range (`75-98`) hold the weight of each value in that
//!   range, and any other column may hold a whole list of weights for values
//!   25, 26, ... separated by `;` or `|`, optionally wrapped in `[...]`.
//!
//! A `25-74` header covers 26 to 74: the weight of value 25 is always zero.

use std::{collections::BTreeMap, fs::File, io, path::PathBuf};

use anyhow::Context;
use buildcost_model::{
    GroupWeights, ValueRange, WeightTable, parse_height, weight_table::known_bounds,
};

use crate::util::Output;

const HEIGHT_HEADERS: [&str; 4] = ["height", "inches", "height_in", "height_inches"];
const LONG_ATTRIBUTE_HEADERS: [&str; 3] = ["skill", "ability", "stat"];
const WIDE_ATTRIBUTE_HEADERS: [&str; 5] = ["attribute", "skill", "ability", "stat", "statistic"];
const VALUE_HEADERS: [&str; 3] = ["slider", "value", "slidervalue"];
const WEIGHT_HEADERS: [&str; 3] = ["weight", "weights", "w"];

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ConvertWeightsArg {
    /// Weight sheet CSV in long or wide layout
    input: PathBuf,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub(crate) enum ConvertError {
    #[display("the sheet has no data rows")]
    NoRows,
    #[display(
        "could not detect the sheet layout: expected a height column, plus attribute, value and weight columns for the long layout"
    )]
    UnknownLayout,
    #[display("no row has a usable height")]
    NoHeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
enum Layout {
    #[display("long (height, attribute, value, weight)")]
    Long,
    #[display("wide (one row per height and attribute)")]
    Wide,
}

#[derive(Debug)]
struct Conversion {
    layout: Layout,
    table: WeightTable,
    warnings: Vec<String>,
}

type Sheet = BTreeMap<u32, BTreeMap<String, Vec<Option<f64>>>>;

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Parses a number after dropping every character that cannot be part of one.
fn parse_loose_number(cell: &str) -> Option<f64> {
    let kept = cell
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect::<String>();
    if kept.is_empty() {
        return None;
    }
    kept.parse().ok().filter(|n: &f64| n.is_finite())
}

/// Parses a `99` or `75-98` column header.
fn parse_range_header(header: &str) -> Option<(u32, u32)> {
    let short_number = |s: &str| {
        let digits = (1..=3).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
        digits.then(|| s.parse::<u32>().ok()).flatten()
    };
    let header = header.trim();
    let (start, end) = match header.split_once('-') {
        Some((start, end)) => (short_number(start)?, short_number(end)?),
        None => {
            let value = short_number(header)?;
            (value, value)
        }
    };
    if start == 25 && end == 74 {
        return Some((26, 74));
    }
    Some((start, end))
}

/// Splits a `a;b;c`, `a|b|c` or `[a;b;c]` cell; other cells are not lists.
fn parse_list_cell(cell: &str) -> Option<Vec<Option<f64>>> {
    let cell = cell.trim();
    let bracketed = cell.contains('[') && cell.contains(']');
    if !cell.contains(';') && !cell.contains('|') && !bracketed {
        return None;
    }
    let inner = cell.strip_prefix('[').unwrap_or(cell);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    let weights = inner
        .split([';', '|'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_loose_number)
        .collect::<Vec<_>>();
    (!weights.is_empty()).then_some(weights)
}

fn empty_sequence() -> Vec<Option<f64>> {
    vec![None; ValueRange::DISPLAY.len()]
}

fn convert_long(
    rows: &[Vec<String>],
    height: usize,
    attribute: usize,
    value: Option<usize>,
    weight: Option<usize>,
    warnings: &mut Vec<String>,
) -> Sheet {
    let mut sheet = Sheet::new();
    for row in rows {
        let cell = |i: usize| row.get(i).map_or("", |c| c.trim());
        let Ok(h) = parse_height(cell(height)) else {
            continue;
        };
        let name = cell(attribute);
        if name.is_empty() {
            continue;
        }
        let sequence = sheet
            .entry(h)
            .or_default()
            .entry(name.to_owned())
            .or_insert_with(empty_sequence);

        let slider = value.and_then(|i| cell(i).parse::<u32>().ok());
        let w = weight.and_then(|i| cell(i).parse::<f64>().ok());
        match slider {
            Some(v) => {
                if let Some(offset) = ValueRange::DISPLAY.offset(v) {
                    sequence[offset] = w;
                }
            }
            None if w.is_some() => warnings.push(format!(
                "row for height={h}, attribute={name} has a weight but no value; skipped"
            )),
            None => {}
        }
    }
    sheet
}

fn convert_wide(
    headers: &[String],
    rows: &[Vec<String>],
    height: usize,
    attribute: Option<usize>,
    warnings: &mut Vec<String>,
) -> Sheet {
    let range_columns = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| Some((i, parse_range_header(h)?)))
        .collect::<Vec<_>>();
    let list_columns = (0..headers.len())
        .filter(|&i| i != height && Some(i) != attribute)
        .filter(|i| !range_columns.iter().any(|(r, _)| r == i))
        .collect::<Vec<_>>();

    let mut sheet = Sheet::new();
    let Some(attribute) = attribute else {
        warnings.push("wide sheet has no attribute column; nothing to convert".to_owned());
        return sheet;
    };

    for row in rows {
        let cell = |i: usize| row.get(i).map_or("", |c| c.trim());
        let Ok(h) = parse_height(cell(height)) else {
            continue;
        };
        let group = sheet.entry(h).or_default();
        let name = cell(attribute);
        if name.is_empty() {
            continue;
        }
        let sequence = group.entry(name.to_owned()).or_insert_with(empty_sequence);

        for &(column, (start, end)) in &range_columns {
            let Some(weight) = parse_loose_number(cell(column)) else {
                continue;
            };
            for value in start..=end {
                if let Some(offset) = ValueRange::DISPLAY.offset(value) {
                    sequence[offset] = Some(weight);
                }
            }
        }

        for &column in &list_columns {
            if let Some(mut weights) = parse_list_cell(cell(column)) {
                weights.truncate(ValueRange::DISPLAY.len());
                *sequence = weights;
            }
        }
    }
    sheet
}

/// Gives every height every attribute seen anywhere, then normalizes.
fn into_table(sheet: Sheet) -> WeightTable {
    let names = sheet
        .values()
        .flat_map(BTreeMap::keys)
        .cloned()
        .collect::<std::collections::BTreeSet<_>>();

    let mut table = WeightTable::new();
    for (height, mut attributes) in sheet {
        let mut group = GroupWeights::new();
        for name in &names {
            let weights = attributes.remove(name).unwrap_or_else(empty_sequence);
            group.insert(name.clone(), weights);
        }
        table.insert(height, group);
    }
    table.normalize();
    table
}

fn convert(headers: &[String], rows: &[Vec<String>]) -> Result<Conversion, ConvertError> {
    if rows.is_empty() {
        return Err(ConvertError::NoRows);
    }
    let height = find_column(headers, &HEIGHT_HEADERS).ok_or(ConvertError::UnknownLayout)?;
    let long_attribute = find_column(headers, &LONG_ATTRIBUTE_HEADERS);
    let value = find_column(headers, &VALUE_HEADERS);
    let weight = find_column(headers, &WEIGHT_HEADERS);

    let mut warnings = vec![];
    let (layout, sheet) = match long_attribute {
        Some(attribute) if value.is_some() || weight.is_some() => (
            Layout::Long,
            convert_long(rows, height, attribute, value, weight, &mut warnings),
        ),
        _ => {
            let attribute = find_column(headers, &WIDE_ATTRIBUTE_HEADERS);
            (
                Layout::Wide,
                convert_wide(headers, rows, height, attribute, &mut warnings),
            )
        }
    };

    if sheet.is_empty() {
        return Err(ConvertError::NoHeights);
    }
    Ok(Conversion {
        layout,
        table: into_table(sheet),
        warnings,
    })
}

fn read_sheet(path: &std::path::Path) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let file =
        File::open(path).with_context(|| format!("Failed to open sheet: {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(io::BufReader::new(file));
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(str::to_owned)
        .collect();
    let rows = reader
        .records()
        .map(|record| Ok(record?.iter().map(str::to_owned).collect()))
        .collect::<Result<Vec<_>, csv::Error>>()
        .with_context(|| format!("Failed to parse sheet: {}", path.display()))?;
    Ok((headers, rows))
}

pub(crate) fn run(arg: &ConvertWeightsArg) -> anyhow::Result<()> {
    let ConvertWeightsArg { input, output } = arg;

    eprintln!("Parsing {}...", input.display());
    let (headers, rows) = read_sheet(input)?;
    let conversion = convert(&headers, &rows)
        .with_context(|| format!("Failed to convert {}", input.display()))?;
    eprintln!("Detected {} layout", conversion.layout);
    for warning in &conversion.warnings {
        eprintln!("warning: {warning}");
    }

    let table = &conversion.table;
    let unknown = table
        .groups()
        .flat_map(|(_, group)| group.iter())
        .filter(|(_, weights)| {
            known_bounds(weights).is_none_or(|known| known.max() == ValueRange::DISPLAY.min())
        })
        .count();
    if unknown > 0 {
        eprintln!("warning: {unknown} attribute sequences have no known weight past value 25");
    }

    Output::save_json(table, output.clone())?;

    let attributes = table.groups().next().map_or(0, |(_, g)| g.len());
    eprintln!("Heights: {}, attributes: {attributes}", table.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|&c| c.to_owned()).collect()
    }

    #[test]
    fn test_range_header() {
        assert_eq!(parse_range_header("99"), Some((99, 99)));
        assert_eq!(parse_range_header(" 75-98 "), Some((75, 98)));
        assert_eq!(parse_range_header("25-74"), Some((26, 74)));
        assert_eq!(parse_range_header("Block"), None);
        assert_eq!(parse_range_header("1000"), None);
        assert_eq!(parse_range_header("-5"), None);
    }

    #[test]
    fn test_list_cell() {
        assert_eq!(
            parse_list_cell("[0; 1.5; x; 3]"),
            Some(vec![Some(0.0), Some(1.5), None, Some(3.0)])
        );
        assert_eq!(parse_list_cell("1|2"), Some(vec![Some(1.0), Some(2.0)]));
        assert_eq!(parse_list_cell("12"), None);
    }

    #[test]
    fn test_long_layout() {
        let headers = strings(&["Height", "Skill", "Slider", "Weight"]);
        let rows = vec![
            strings(&["80", "Block", "26", "3"]),
            strings(&["80", "Block", "27", "4.5"]),
            strings(&["80", "Block", "120", "9"]),
            strings(&["78", "Steal", "30", "2"]),
        ];
        let conversion = convert(&headers, &rows).unwrap();
        assert_eq!(conversion.layout, Layout::Long);

        let table = conversion.table;
        let block = table.group(80).unwrap().attribute("Block").unwrap();
        assert_eq!(block.len(), 75);
        assert_eq!(&block[..4], &[Some(0.0), Some(3.0), Some(4.5), None]);
        // every height gets every attribute
        let steal = table.group(80).unwrap().attribute("Steal").unwrap();
        assert_eq!(steal[0], Some(0.0));
        assert!(steal[1..].iter().all(Option::is_none));
        assert_eq!(table.group(78).unwrap().attribute("Steal").unwrap()[5], Some(2.0));
    }

    #[test]
    fn test_wide_layout_with_ranges() {
        let headers = strings(&["Height", "Attribute", "25-74", "75-98", "99"]);
        let rows = vec![strings(&["6'8", "Block", "2", "5", "$12"])];
        let conversion = convert(&headers, &rows).unwrap();
        assert_eq!(conversion.layout, Layout::Wide);

        let block = conversion.table.group(80).unwrap().attribute("Block").unwrap();
        assert_eq!(block[0], Some(0.0));
        assert!(block[1..50].iter().all(|w| *w == Some(2.0)));
        assert!(block[50..74].iter().all(|w| *w == Some(5.0)));
        assert_eq!(block[74], Some(12.0));
    }

    #[test]
    fn test_wide_layout_with_lists() {
        let headers = strings(&["height", "skill", "weights list"]);
        let rows = vec![strings(&["80", "Block", "7;1;2;3"])];
        let block = convert(&headers, &rows)
            .unwrap()
            .table
            .group(80)
            .unwrap()
            .attribute("Block")
            .unwrap()
            .to_vec();
        assert_eq!(&block[..5], &[Some(0.0), Some(1.0), Some(2.0), Some(3.0), None]);
        assert_eq!(block.len(), 75);
    }

    #[test]
    fn test_long_weight_without_value_warns() {
        let headers = strings(&["height", "skill", "weight"]);
        let rows = vec![strings(&["80", "Block", "3"])];
        let conversion = convert(&headers, &rows).unwrap();
        assert_eq!(conversion.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_layout() {
        let headers = strings(&["name", "weight"]);
        let rows = vec![strings(&["Block", "3"])];
        assert!(matches!(
            convert(&headers, &rows),
            Err(ConvertError::UnknownLayout)
        ));
        assert!(matches!(convert(&headers, &[]), Err(ConvertError::NoRows)));
    }
}
