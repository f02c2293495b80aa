//! HTTP-date parsing and formatting (RFC 7231 section 7.1.1.1).
//!
//! All three historical formats are accepted on input; output is always
//! IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed HTTP date {0:?}")]
pub struct HttpDateError(pub String);

pub fn parse(value: &str) -> Result<DateTime<Utc>, HttpDateError> {
    let value = value.trim();
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    [IMF_FIXDATE, RFC_850, ASCTIME]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&collapsed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| HttpDateError(value.to_string()))
}

pub fn format(date: &DateTime<Utc>) -> String {
    date.format(IMF_FIXDATE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    #[test]
    fn test_all_formats() {
        assert_eq!(parse("Sun, 06 Nov 1994 08:49:37 GMT").unwrap(), reference());
        assert_eq!(parse("Sunday, 06-Nov-94 08:49:37 GMT").unwrap(), reference());
        assert_eq!(parse("Sun Nov  6 08:49:37 1994").unwrap(), reference());
    }

    #[test]
    fn test_format() {
        assert_eq!(format(&reference()), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_malformed() {
        assert!(parse("yesterday").is_err());
        assert!(parse("Sun, 32 Nov 1994 08:49:37 GMT").is_err());
    }
}
