//! Interactive weight template filling
//!
//! The template is a CSV whose first column names an attribute and whose
//! remaining columns are attribute values starting at 25 (column 1 is value 25,
//! column 2 is value 26 and so on). For every attribute row the user enters the
//! first value they have data for and then the cumulative cost read off the game
//! for each following value. Those are turned into per-value increments and
//! written into the row.

use std::{
    fs::File,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use buildcost_model::ValueRange;

use crate::util::Output;

const MIN_START: u32 = 26;
const MAX_START: u32 = 80;
const SEPARATOR_WIDTH: usize = 60;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct VcWeightsArg {
    /// Template CSV: header row, then one row per attribute
    #[arg(long)]
    template: PathBuf,
    /// Output file path
    #[arg(long)]
    output: PathBuf,
}

type Rows = Vec<Vec<String>>;

/// Turns cumulative figures into per-step increments; the first figure is kept
/// as is.
fn cumulative_to_increments(cumulative: &[i64]) -> Vec<i64> {
    let Some(&first) = cumulative.first() else {
        return vec![];
    };
    std::iter::once(first)
        .chain(cumulative.windows(2).map(|pair| pair[1] - pair[0]))
        .collect()
}

/// Result of writing increments into a template row.
#[derive(Debug, PartialEq, Eq)]
enum Populated {
    Complete,
    /// The row ended before every increment was written.
    Truncated { written: usize, column: usize },
    RowNotFound,
}

fn populate_row(rows: &mut Rows, name: &str, increments: &[i64], start: u32) -> Populated {
    let Some(row) = rows.iter_mut().find(|row| row.first().is_some_and(|c| c == name)) else {
        return Populated::RowNotFound;
    };
    let offset = (start - ValueRange::DISPLAY.min()) as usize + 1;
    for (i, value) in increments.iter().enumerate() {
        let column = offset + i;
        let Some(cell) = row.get_mut(column) else {
            return Populated::Truncated { written: i, column };
        };
        *cell = value.to_string();
    }
    Populated::Complete
}

/// Reads one trimmed line, failing on end of input.
fn read_answer<R, W>(input: &mut R, prompt: &mut W, question: &str) -> anyhow::Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(prompt, "{question}")?;
    prompt.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("Input ended while waiting for: {}", question.trim_end());
    }
    Ok(line.trim().to_owned())
}

/// Asks for the first value of a row; `None` means the row is skipped.
fn prompt_start<R, W>(input: &mut R, prompt: &mut W, name: &str) -> anyhow::Result<Option<u32>>
where
    R: BufRead,
    W: Write,
{
    loop {
        let question = format!("{name} starting value ({MIN_START}-{MAX_START}, or 's' to skip): ");
        let answer = read_answer(input, prompt, &question)?;
        if answer.eq_ignore_ascii_case("s") || answer.eq_ignore_ascii_case("skip") {
            return Ok(None);
        }
        match answer.parse::<u32>() {
            Ok(start) if (MIN_START..=MAX_START).contains(&start) => return Ok(Some(start)),
            Ok(_) => writeln!(prompt, "Please enter a value between {MIN_START} and {MAX_START}.")?,
            Err(_) => writeln!(prompt, "Invalid input. Please enter a number or 's' to skip.")?,
        }
    }
}

/// Collects cumulative values until the user types `x`.
fn prompt_values<R, W>(input: &mut R, prompt: &mut W, name: &str, start: u32) -> anyhow::Result<Vec<i64>>
where
    R: BufRead,
    W: Write,
{
    writeln!(prompt)?;
    writeln!(prompt, "Enter cumulative values for {name} starting at {start}.")?;
    writeln!(prompt, "Type 'x' when finished.")?;

    let mut values = vec![];
    loop {
        let answer = read_answer(input, prompt, &format!("Value {}: ", values.len() + 1))?;
        if answer.eq_ignore_ascii_case("x") {
            return Ok(values);
        }
        match answer.parse::<i64>() {
            Ok(value) => values.push(value),
            Err(_) => writeln!(prompt, "Invalid input. Please enter a number or 'x'.")?,
        }
    }
}

fn fill_rows<R, W>(rows: &mut Rows, input: &mut R, prompt: &mut W) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
{
    let names = rows
        .iter()
        .skip(1)
        .filter_map(|row| row.first())
        .filter(|name| !name.is_empty())
        .cloned()
        .collect::<Vec<_>>();

    for name in &names {
        writeln!(prompt)?;
        writeln!(prompt, "{}", "=".repeat(SEPARATOR_WIDTH))?;

        let Some(start) = prompt_start(input, prompt, name)? else {
            writeln!(prompt, "{name} skipped.")?;
            continue;
        };
        let cumulative = prompt_values(input, prompt, name, start)?;
        if cumulative.is_empty() {
            writeln!(prompt, "No data entered for {name}. Skipping.")?;
            continue;
        }

        let increments = cumulative_to_increments(&cumulative);
        match populate_row(rows, name, &increments, start) {
            Populated::Complete => {}
            Populated::Truncated { written, column } => writeln!(
                prompt,
                "warning: column {column} is out of range, kept the first {written} values"
            )?,
            Populated::RowNotFound => writeln!(prompt, "warning: row {name:?} not found in template")?,
        }
        let end = start as usize + increments.len() - 1;
        writeln!(prompt, "{name} received values for {start} - {end}")?;
    }
    Ok(())
}

fn read_template(path: &Path) -> anyhow::Result<Rows> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open template file: {}", path.display()))?;
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(io::BufReader::new(file))
        .records()
        .map(|record| Ok(record?.iter().map(str::to_owned).collect()))
        .collect::<Result<Rows, csv::Error>>()
        .with_context(|| format!("Failed to parse template file: {}", path.display()))
}

pub(crate) fn run(arg: &VcWeightsArg) -> anyhow::Result<()> {
    let VcWeightsArg { template, output } = arg;

    eprintln!("Loading template from {}...", template.display());
    let mut rows = read_template(template)?;

    fill_rows(&mut rows, &mut io::stdin().lock(), &mut io::stderr().lock())?;

    let mut output = Output::open(output.clone())?;
    output.write_csv_rows(&rows)?;
    eprintln!();
    eprintln!("CSV file created successfully: {}", output.display_path());

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn template() -> Rows {
        let header = std::iter::once("Attribute".to_owned())
            .chain((25..=30).map(|v: u32| v.to_string()))
            .collect();
        let row = |name: &str| {
            std::iter::once(name.to_owned())
                .chain(std::iter::repeat_n(String::new(), 6))
                .collect()
        };
        vec![header, row("Close Shot"), row("Block")]
    }

    #[test]
    fn test_cumulative_to_increments() {
        assert_eq!(cumulative_to_increments(&[]), Vec::<i64>::new());
        assert_eq!(cumulative_to_increments(&[5]), vec![5]);
        assert_eq!(cumulative_to_increments(&[5, 12, 20, 29]), vec![5, 7, 8, 9]);
    }

    #[test]
    fn test_populate_row_starts_at_value_column() {
        let mut rows = template();
        let result = populate_row(&mut rows, "Block", &[4, 5], 27);
        assert_eq!(result, Populated::Complete);
        assert_eq!(rows[2], vec!["Block", "", "", "4", "5", "", ""]);
    }

    #[test]
    fn test_populate_row_overflow_and_unknown_row() {
        let mut rows = template();
        let result = populate_row(&mut rows, "Close Shot", &[1, 2, 3, 4], 29);
        assert_eq!(result, Populated::Truncated { written: 2, column: 7 });
        assert_eq!(rows[1][5..], ["1", "2"]);

        assert_eq!(populate_row(&mut rows, "Steal", &[1], 26), Populated::RowNotFound);
    }

    #[test]
    fn test_fill_rows_from_answers() {
        let mut rows = template();
        let answers = "20\n26\nabc\n3\n7\nx\nskip\n";
        let mut prompt = Vec::new();
        fill_rows(&mut rows, &mut Cursor::new(answers), &mut prompt).unwrap();

        assert_eq!(rows[1], vec!["Close Shot", "", "3", "4", "", "", ""]);
        assert!(rows[2][1..].iter().all(String::is_empty));

        let prompt = String::from_utf8(prompt).unwrap();
        assert!(prompt.contains("Please enter a value between 26 and 80."));
        assert!(prompt.contains("Invalid input. Please enter a number or 'x'."));
        assert!(prompt.contains("Close Shot received values for 26 - 27"));
        assert!(prompt.contains("Block skipped."));
    }

    #[test]
    fn test_fill_rows_fails_on_early_end_of_input() {
        let mut rows = template();
        let result = fill_rows(&mut rows, &mut Cursor::new("26\n1\n"), &mut Vec::new());
        assert!(result.is_err());
    }
}
