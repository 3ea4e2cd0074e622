/// Error returned when a height cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("could not parse height {input:?}, expected a form like 6'8 or 80 (inches)")]
pub struct HeightParseError {
    pub input: String,
}

/// Parses a height into total inches.
///
/// Accepts `feet`, any run of non-digit separator characters, then `inches`
/// (`6'8`, `6'8"`, `6′8″`, `6 ft 8 in`), or a bare integer number of inches.
/// Text after the inches is ignored.
///
/// # Example
///
/// ```
/// use buildcost_model::parse_height;
///
/// assert_eq!(parse_height("6'8").unwrap(), 80);
/// assert_eq!(parse_height("6′8″").unwrap(), 80);
/// assert_eq!(parse_height("80").unwrap(), 80);
/// assert!(parse_height("tall").is_err());
/// ```
pub fn parse_height(input: &str) -> Result<u32, HeightParseError> {
    let text = input.trim();
    let error = || HeightParseError {
        input: input.to_owned(),
    };

    if let Some(inches) = parse_feet_inches(text) {
        return Ok(inches);
    }
    text.parse::<u32>().map_err(|_| error())
}

fn parse_feet_inches(text: &str) -> Option<u32> {
    let (feet, rest) = split_digits(text)?;
    let rest = rest.trim_start();
    let separator_len = rest
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map_or(rest.len(), |(i, _)| i);
    if separator_len == 0 {
        return None;
    }
    let (inches, _) = split_digits(rest[separator_len..].trim_start())?;
    feet.checked_mul(12)?.checked_add(inches)
}

/// Splits a leading run of ASCII digits off `text` and parses it.
fn split_digits(text: &str) -> Option<(u32, &str)> {
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(text.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}
