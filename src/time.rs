//! Wire time formats.
//!
//! Two textual forms appear on the wire (spec §6):
//!   packed: `YYYYMMDDThhmmss[.mmm]`
//!   iso:    `YYYY-MM-DDThh:mm:ss[.mmm]Z`
//!
//! Both MUST round-trip losslessly; parsing accepts either form, formatting
//! emits whichever form the caller asks for.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{AgentError, Result};

const PACKED_FMT_MS: &str = "%Y%m%dT%H%M%S%.3f";
const PACKED_FMT: &str = "%Y%m%dT%H%M%S";

/// Format `t` in packed form (`YYYYMMDDThhmmss[.mmm]`).
pub fn to_packed(t: DateTime<Utc>) -> String {
    if t.timestamp_subsec_millis() == 0 {
        t.format(PACKED_FMT).to_string()
    } else {
        t.format(PACKED_FMT_MS).to_string()
    }
}

/// Format `t` in ISO form (`YYYY-MM-DDThh:mm:ss[.mmm]Z`).
pub fn to_iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse either the packed or the ISO wire form.
pub fn parse(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }

    for fmt in [PACKED_FMT_MS, PACKED_FMT] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    Err(AgentError::InvalidPayload {
        cmd: "time".into(),
        reason: format!("unparseable timestamp: {s}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn packed_round_trip() {
        let t = Utc.with_ymd_and_hms(2026, 7, 27, 14, 5, 9).unwrap();
        let packed = to_packed(t);
        assert_eq!(packed, "20260727T140509");
        assert_eq!(parse(&packed).unwrap(), t);
    }

    #[test]
    fn packed_round_trip_with_millis() {
        let t = Utc.with_ymd_and_hms(2026, 7, 27, 14, 5, 9).unwrap() + chrono::Duration::milliseconds(250);
        let packed = to_packed(t);
        assert_eq!(parse(&packed).unwrap(), t);
    }

    #[test]
    fn iso_round_trip() {
        let t = Utc.with_ymd_and_hms(2026, 7, 27, 14, 5, 9).unwrap();
        let iso = to_iso(t);
        assert!(iso.ends_with('Z'));
        assert_eq!(parse(&iso).unwrap(), t);
    }

    #[test]
    fn parses_either_form() {
        let t = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse("20260102T030405").unwrap(), t);
        assert_eq!(parse("2026-01-02T03:04:05Z").unwrap(), t);
    }
}
