//! Wall-clock input in a named timezone → UTC instants.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::CliError;

/// Accepted `--start-time`/`--end-time` layout (`DD-MM-YYYY:HH:mm:ss`).
pub const INPUT_FORMAT: &str = "%d-%m-%Y:%H:%M:%S";

pub const DEFAULT_TIMEZONE: &str = "America/Denver";

/// Resolve an IANA zone name, or a suffix that names exactly one zone
/// (`Denver` → `America/Denver`).
pub fn resolve_timezone(name: &str) -> Result<Tz, CliError> {
    if let Ok(tz) = name.parse::<Tz>() {
        return Ok(tz);
    }

    let suffix = format!("/{name}");
    let matches: Vec<Tz> = chrono_tz::TZ_VARIANTS
        .iter()
        .copied()
        .filter(|tz| tz.name().ends_with(&suffix))
        .collect();

    match matches.as_slice() {
        [tz] => Ok(*tz),
        [] => Err(CliError::Validation {
            field: "timezone".into(),
            reason: format!("'{name}' is not a known IANA timezone (e.g. America/Denver)"),
        }),
        several => Err(CliError::Validation {
            field: "timezone".into(),
            reason: format!(
                "'{name}' matches several timezones: {}",
                several.iter().map(|tz| tz.name()).collect::<Vec<_>>().join(", ")
            ),
        }),
    }
}

/// Parse a local wall-clock time in `tz` into a UTC instant.
///
/// Times repeated by a DST fall-back resolve to the earlier instant; times
/// skipped by a spring-forward do not exist and are rejected.
pub fn parse_local(field: &str, value: &str, tz: Tz) -> Result<DateTime<Utc>, CliError> {
    let naive = NaiveDateTime::parse_from_str(value, INPUT_FORMAT).map_err(|e| {
        CliError::Validation {
            field: field.into(),
            reason: format!("'{value}' is not in DD-MM-YYYY:HH:mm:ss format ({e})"),
        }
    })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CliError::Validation {
            field: field.into(),
            reason: format!("{value} does not exist in {} (DST gap)", tz.name()),
        })
}
