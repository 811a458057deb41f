//! Timestamp parsing and re-rendering for the `@timestamp` directive.
//!
//! Input timestamps are treated as UTC. Output format `"json"` renders
//! RFC 3339; any other format string is a token pattern (`YYYY`, `MM`, `DD`,
//! `HH`, `mm`, `ss`, `SSS`) translated to the `time` crate's format
//! description language.

use time::format_description::{self, OwnedFormatItem};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, Date};

use crate::error::MappingError;

/// Parse `input` as a UTC timestamp, optionally with an explicit token
/// pattern. Returns `None` when the input cannot be parsed; the directive
/// downgrades that to a JSON `null`.
pub(crate) fn parse(input: &str, input_format: Option<&str>) -> Option<OffsetDateTime> {
  if let Some(pattern) = input_format {
    let items = translate(pattern).ok()?;
    return PrimitiveDateTime::parse(input, &items)
      .map(PrimitiveDateTime::assume_utc)
      .ok();
  }

  if let Ok(parsed) = OffsetDateTime::parse(input, &Rfc3339) {
    return Some(parsed);
  }

  // ISO datetime without an offset, assumed UTC.
  let naive = format_description!(
    version = 2,
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
  );
  if let Ok(parsed) = PrimitiveDateTime::parse(input, naive) {
    return Some(parsed.assume_utc());
  }

  let date_only = format_description!(version = 2, "[year]-[month]-[day]");
  if let Ok(parsed) = Date::parse(input, date_only) {
    return Some(parsed.midnight().assume_utc());
  }

  // Unix epoch, seconds or milliseconds.
  if let Ok(epoch) = input.parse::<i64>() {
    let seconds = if epoch.abs() >= 100_000_000_000 {
      epoch / 1000
    } else {
      epoch
    };
    return OffsetDateTime::from_unix_timestamp(seconds).ok();
  }

  None
}

/// Render `timestamp` per `pattern`. `"json"` means RFC 3339.
pub(crate) fn format(timestamp: OffsetDateTime, pattern: &str) -> Result<String, MappingError> {
  if pattern == "json" {
    return timestamp
      .format(&Rfc3339)
      .map_err(|e| MappingError::argument("@timestamp", e.to_string()));
  }

  let items = translate(pattern)?;
  timestamp
    .format(&items)
    .map_err(|e| MappingError::argument("@timestamp", e.to_string()))
}

/// Translate a `YYYY-MM-DD`-style token pattern into format items.
fn translate(pattern: &str) -> Result<OwnedFormatItem, MappingError> {
  const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "[year]"),
    ("SSS", "[subsecond digits:3]"),
    ("MM", "[month]"),
    ("DD", "[day]"),
    ("HH", "[hour]"),
    ("hh", "[hour repr:12]"),
    ("mm", "[minute]"),
    ("ss", "[second]"),
    ("A", "[period]"),
  ];

  let mut description = String::with_capacity(pattern.len() * 2);
  let mut rest = pattern;
  'outer: while !rest.is_empty() {
    for (token, replacement) in TOKENS {
      if let Some(tail) = rest.strip_prefix(token) {
        description.push_str(replacement);
        rest = tail;
        continue 'outer;
      }
    }
    let ch = rest.chars().next().unwrap();
    // Escape literal brackets so they survive the description parser.
    if ch == '[' {
      description.push_str("[[");
    } else {
      description.push(ch);
    }
    rest = &rest[ch.len_utf8()..];
  }

  format_description::parse_owned::<2>(&description)
    .map_err(|e| MappingError::argument("@timestamp", format!("bad format '{}': {}", pattern, e)))
}
