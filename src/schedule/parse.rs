//! Schedule sheet parsing.
//!
//! The sheet is authored by hand: day header rows ("Friday Dec 18") group the
//! events below them, times are mostly 12-hour strings, and each event has
//! Spanish, English and Catalan text columns.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;

use crate::db::{LocalizedText, ScheduleEvent};
use crate::sheets::RawScheduleRow;

fn re_day_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\s+(\w+)\s+(\d+)$",
        )
        .unwrap()
    })
}

fn re_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?(?::(\d{2}))?\s*(AM|PM)?$").unwrap())
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Outcome of matching a row against the day header pattern.
#[derive(Debug, PartialEq, Eq)]
enum DayHeader {
    NotHeader,
    Date(NaiveDate),
    /// Looks like a header but the month or day does not resolve.
    Invalid,
}

fn day_header(row: &RawScheduleRow, year: i32) -> DayHeader {
    if !row.start_time.is_empty() || !row.end_time.is_empty() {
        return DayHeader::NotHeader;
    }
    let Some(caps) = re_day_header().captures(row.name_es.trim()) else {
        return DayHeader::NotHeader;
    };

    let date = month_number(&caps[2]).and_then(|month| {
        let day = caps[3].parse::<u32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });
    match date {
        Some(date) => DayHeader::Date(date),
        None => DayHeader::Invalid,
    }
}

/// Parse `8:00 PM`, `12:15 am`, `8 PM`, `20:00` or `20:00:00` to a time of day.
///
/// 24-hour form requires minutes; a bare number is rejected.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let normalized = raw.trim().to_uppercase().replace('.', "");
    let caps = re_time().captures(&normalized)?;

    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None if caps.get(4).is_some() => 0,
        None => return None,
    };
    let second: u32 = match caps.get(3) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };

    if let Some(period) = caps.get(4) {
        if !(1..=12).contains(&hour) {
            return None;
        }
        match (period.as_str(), hour) {
            ("PM", h) if h != 12 => hour += 12,
            ("AM", 12) => hour = 0,
            _ => {}
        }
    }

    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Combine a venue-local date and time into an absolute instant.
fn localize(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Fold the schedule rows into public events, in sheet order.
///
/// Day headers set the date for the rows that follow; rows before the first
/// valid header, private rows and rows without a name or start time are not
/// emitted.
pub fn parse_schedule_rows(rows: &[RawScheduleRow], year: i32, tz: Tz) -> Vec<ScheduleEvent> {
    let mut current_date: Option<NaiveDate> = None;
    let mut events = Vec::new();

    for row in rows {
        match day_header(row, year) {
            DayHeader::Date(date) => {
                log::debug!("Schedule: day header '{}' -> {}", row.name_es, date);
                current_date = Some(date);
                continue;
            }
            DayHeader::Invalid => {
                log::warn!(
                    "Schedule: unresolvable day header '{}'; dropping rows until the next header",
                    row.name_es
                );
                current_date = None;
                continue;
            }
            DayHeader::NotHeader => {}
        }

        let Some(date) = current_date else {
            continue;
        };
        if !row.public.trim().eq_ignore_ascii_case("TRUE") {
            continue;
        }
        let name_es = row.name_es.trim();
        if name_es.is_empty() || row.start_time.is_empty() {
            continue;
        }

        let Some(start_time) =
            parse_time_of_day(&row.start_time).and_then(|t| localize(date, t, tz))
        else {
            log::warn!(
                "Schedule: skipping '{}' on {}: invalid start time '{}'",
                name_es,
                date,
                row.start_time
            );
            continue;
        };

        let end_time = parse_time_of_day(&row.end_time).and_then(|end| {
            let start_local = start_time.time();
            let end_date = if end < start_local {
                date.succ_opt()?
            } else {
                date
            };
            localize(end_date, end, tz)
        });
        if end_time.is_none() && !row.end_time.is_empty() {
            log::debug!(
                "Schedule: ignoring unparseable end time '{}' for '{}'",
                row.end_time,
                name_es
            );
        }

        events.push(ScheduleEvent {
            start_time,
            end_time,
            location: row.location.trim().to_string(),
            name: LocalizedText {
                es: name_es.to_string(),
                en: row.name_en.trim().to_string(),
                ca: row.name_ca.trim().to_string(),
            },
            description: LocalizedText {
                es: row.description_es.trim().to_string(),
                en: row.description_en.trim().to_string(),
                ca: row.description_ca.trim().to_string(),
            },
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    const VENUE: Tz = chrono_tz::America::Tegucigalpa;

    fn header(text: &str) -> RawScheduleRow {
        RawScheduleRow {
            name_es: text.to_string(),
            ..RawScheduleRow::default()
        }
    }

    fn event_row(start: &str, end: &str, public: &str, name: &str) -> RawScheduleRow {
        RawScheduleRow {
            start_time: start.to_string(),
            end_time: end.to_string(),
            public: public.to_string(),
            name_es: name.to_string(),
            team: "Planner".to_string(),
            location: "Jardín".to_string(),
            name_en: format!("{name} EN"),
            name_ca: format!("{name} CA"),
            ..RawScheduleRow::default()
        }
    }

    #[test]
    fn test_parse_time_of_day_forms() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(parse_time_of_day("8:00 PM"), Some(t(20, 0)));
        assert_eq!(parse_time_of_day("4:00 pm"), Some(t(16, 0)));
        assert_eq!(parse_time_of_day("12:15 am"), Some(t(0, 15)));
        assert_eq!(parse_time_of_day("12:30 PM"), Some(t(12, 30)));
        assert_eq!(parse_time_of_day("8 PM"), Some(t(20, 0)));
        assert_eq!(parse_time_of_day("8:00p.m."), Some(t(20, 0)));
        assert_eq!(parse_time_of_day(" 8:00 P.M. "), Some(t(20, 0)));
        assert_eq!(parse_time_of_day("20:00"), Some(t(20, 0)));
        assert_eq!(
            parse_time_of_day("20:00:30"),
            NaiveTime::from_hms_opt(20, 0, 30)
        );
    }

    #[test]
    fn test_parse_time_of_day_rejects_garbage() {
        for raw in ["", "TBD", "20", "13:00 PM", "25:00", "8:75 AM", "noon"] {
            assert_eq!(parse_time_of_day(raw), None, "{raw} should not parse");
        }
    }

    #[test]
    fn test_day_header_sets_date_and_localizes() {
        let rows = vec![
            header("Friday Dec 18"),
            event_row("4:00 PM", "6:00 PM", "TRUE", "Ceremonia"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_time.to_rfc3339(), "2026-12-18T16:00:00-06:00");
        assert_eq!(
            events[0].end_time.map(|t| t.to_rfc3339()).as_deref(),
            Some("2026-12-18T18:00:00-06:00")
        );
        assert_eq!(events[0].name.es, "Ceremonia");
        assert_eq!(events[0].name.en, "Ceremonia EN");
        assert_eq!(events[0].location, "Jardín");
    }

    #[test]
    fn test_header_accepts_full_month_names_and_case() {
        let rows = vec![
            header("saturday DECEMBER 19"),
            event_row("10:00 AM", "", "true", "Brunch"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);
        assert_eq!(events[0].start_time.to_rfc3339(), "2026-12-19T10:00:00-06:00");
        assert!(events[0].end_time.is_none());
    }

    #[test]
    fn test_private_rows_are_never_emitted() {
        let rows = vec![
            header("Friday Dec 18"),
            event_row("2:00 PM", "3:00 PM", "FALSE", "Montaje"),
            event_row("3:00 PM", "", "", "Fotos familia"),
            event_row("4:00 PM", "", "TRUE", "Ceremonia"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);
        let names: Vec<&str> = events.iter().map(|e| e.name.es.as_str()).collect();
        assert_eq!(names, vec!["Ceremonia"]);
    }

    #[test]
    fn test_rows_before_first_header_are_dropped() {
        let rows = vec![
            event_row("9:00 AM", "", "TRUE", "Llegada"),
            header("Friday Dec 18"),
            event_row("4:00 PM", "", "TRUE", "Ceremonia"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name.es, "Ceremonia");
    }

    #[test]
    fn test_invalid_header_clears_current_date() {
        let rows = vec![
            header("Friday Dec 18"),
            event_row("4:00 PM", "", "TRUE", "Ceremonia"),
            header("Saturday Foo 19"),
            event_row("10:00 AM", "", "TRUE", "Brunch"),
            header("Sunday Dec 20"),
            event_row("11:00 AM", "", "TRUE", "Despedida"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);
        let names: Vec<&str> = events.iter().map(|e| e.name.es.as_str()).collect();
        assert_eq!(names, vec!["Ceremonia", "Despedida"]);
    }

    #[test]
    fn test_impossible_date_is_an_invalid_header() {
        let rows = vec![
            header("Friday Dec 18"),
            header("Monday Feb 30"),
            event_row("4:00 PM", "", "TRUE", "Ceremonia"),
        ];
        assert!(parse_schedule_rows(&rows, 2026, VENUE).is_empty());
    }

    #[test]
    fn test_unparseable_start_drops_row_and_bad_end_is_ignored() {
        let rows = vec![
            header("Friday Dec 18"),
            event_row("TBD", "6:00 PM", "TRUE", "Cóctel"),
            event_row("7:00 PM", "late", "TRUE", "Cena"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name.es, "Cena");
        assert!(events[0].end_time.is_none());
    }

    #[test]
    fn test_end_before_start_rolls_to_next_day() {
        let rows = vec![
            header("Saturday Dec 19"),
            event_row("9:00 PM", "2:00 AM", "TRUE", "Fiesta"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);
        assert_eq!(
            events[0].end_time.map(|t| t.to_rfc3339()).as_deref(),
            Some("2026-12-20T02:00:00-06:00")
        );
    }

    #[test]
    fn test_header_with_times_is_a_data_row() {
        let rows = vec![
            header("Friday Dec 18"),
            event_row("4:00 PM", "", "TRUE", "Sunday Dec 20"),
        ];
        let events = parse_schedule_rows(&rows, 2026, VENUE);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].start_time.date_naive(),
            NaiveDate::from_ymd_opt(2026, 12, 18).unwrap()
        );
    }

    #[test]
    fn test_other_timezone_offsets_apply() {
        let rows = vec![
            header("Friday Jul 17"),
            event_row("6:00 PM", "", "TRUE", "Sopar"),
        ];
        let events = parse_schedule_rows(&rows, 2026, chrono_tz::Europe::Madrid);
        assert_eq!(events[0].start_time.to_rfc3339(), "2026-07-17T18:00:00+02:00");
    }
}
