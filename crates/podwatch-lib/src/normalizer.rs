//! Record normalizer
//!
//! Turns the templated listing produced by the resource client into
//! [`InstanceRecord`]s. Columns are positional and comma separated:
//!
//! ```text
//! name,status,node,restarts(a+b+...),terminatedMessage,creationTimestamp
//! ```
//!
//! Fields cannot contain commas. A line that does not split into exactly the
//! expected number of columns aborts the whole listing with a [`ParseError`].

use crate::error::ParseError;
use crate::models::{InstanceRecord, NameFilter};
use chrono::{DateTime, Utc};

/// Placeholder the template engine prints for missing fields
pub const NO_VALUE_SENTINEL: &str = "<no value>";

/// Number of columns in a listing line
pub const COLUMN_COUNT: usize = 6;

/// Parse a full listing, then apply the name filter
pub fn normalize(raw: &str, filter: &NameFilter) -> Result<Vec<InstanceRecord>, ParseError> {
    let records = parse_records(raw)?;
    Ok(records
        .into_iter()
        .filter(|r| filter.matches(&r.name))
        .collect())
}

/// Parse every non-empty line of a listing
pub fn parse_records(raw: &str) -> Result<Vec<InstanceRecord>, ParseError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_line(idx + 1, line))
        .collect()
}

fn parse_line(line_number: usize, line: &str) -> Result<InstanceRecord, ParseError> {
    let columns: Vec<&str> = line.trim_end_matches('\r').split(',').collect();
    if columns.len() != COLUMN_COUNT {
        return Err(ParseError::new(
            line_number,
            line,
            format!("expected {} columns, found {}", COLUMN_COUNT, columns.len()),
        ));
    }

    let field = |idx: usize| clean_field(columns[idx]);

    let name = field(0);
    if name.is_empty() {
        return Err(ParseError::new(line_number, line, "empty instance name"));
    }

    let restart_count = sum_restarts(&field(3))
        .map_err(|reason| ParseError::new(line_number, line, reason))?;

    let raw_ts = field(5);
    let creation_timestamp = DateTime::parse_from_rfc3339(&raw_ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            ParseError::new(line_number, line, format!("invalid timestamp {:?}: {}", raw_ts, e))
        })?;

    Ok(InstanceRecord {
        name,
        status: field(1),
        node: field(2),
        restart_count,
        terminated_message: field(4),
        creation_timestamp,
    })
}

/// Trim a column and map the "no value" sentinel to an empty string
fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == NO_VALUE_SENTINEL {
        String::new()
    } else {
        trimmed.replace(NO_VALUE_SENTINEL, "")
    }
}

/// Sum a `a+b+c` restart column; empty segments count as zero
pub fn sum_restarts(raw: &str) -> Result<u32, String> {
    raw.split('+')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .try_fold(0u32, |acc, segment| {
            let count: u32 = segment
                .parse()
                .map_err(|_| format!("invalid restart count segment {:?}", segment))?;
            Ok(acc.saturating_add(count))
        })
}
