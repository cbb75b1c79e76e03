use chrono::{DateTime, Datelike, Offset, TimeZone, Timelike};

/// Format a time for the sync timestamp annotation
///
/// `YYYY-MM-DDTHH:MM:SS` followed by `Z` for UTC, otherwise the offset as
/// `+HHMM`/`-HHMM`. Existing consumers parse this exact layout.
pub fn iso8601<Tz: TimeZone>(t: &DateTime<Tz>) -> String {
    let offset_secs = t.offset().fix().local_minus_utc();
    let zone = if offset_secs == 0 {
        "Z".to_string()
    } else {
        let sign = if offset_secs < 0 { '-' } else { '+' };
        let minutes = offset_secs.abs() / 60;
        format!("{}{:02}{:02}", sign, minutes / 60, minutes % 60)
    };
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        zone
    )
}
