//! Fixed column layout of the guest and schedule sheets, and cell coercion.
//!
//! Guest sheet (header in row 1):
//! A name, B couple flag, C kids, D-G owner notes, H invite code,
//! I-O guest response (adults, kids, dietary, message, song, country,
//! response time).
//!
//! Schedule sheet (header in row 1):
//! A start, B end, C public, D name ES, E team, F location, G description ES,
//! H name EN, I name CA, J description EN, K description CA.

use serde_json::Value;

use super::{RawScheduleRow, ResponseRow, RosterRow};

/// First data row on both sheets; row 1 holds the headers.
pub const FIRST_DATA_ROW: i64 = 2;

const ROSTER_NAME: usize = 0;
const ROSTER_COUPLE: usize = 1;
const ROSTER_KIDS: usize = 2;
const ROSTER_INVITE_CODE: usize = 7;
const ROSTER_CONFIRMED_ADULTS: usize = 8;

/// Quote a sheet title for A1 notation, doubling embedded quotes.
fn quoted(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

pub fn roster_read_range(sheet: &str) -> String {
    format!("{}!A{}:I", quoted(sheet), FIRST_DATA_ROW)
}

pub fn schedule_read_range(sheet: &str) -> String {
    format!("{}!A{}:K", quoted(sheet), FIRST_DATA_ROW)
}

pub fn response_write_range(sheet: &str, sheet_row: i64) -> String {
    format!("{}!I{}:O{}", quoted(sheet), sheet_row, sheet_row)
}

/// Render a cell as trimmed text. Booleans use the sheet's `TRUE`/`FALSE`.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Leading-integer parse: `"3 kids"` is 3, blank or non-numeric is 0.
pub fn cell_to_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => leading_int(s).unwrap_or(0),
        _ => 0,
    }
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Couple flag reads as yes for `si`, `sí`, `yes`, `true`, `x`.
pub fn is_couple_flag(flag: &str) -> bool {
    matches!(
        flag.trim().to_lowercase().as_str(),
        "si" | "sí" | "yes" | "true" | "x"
    )
}

fn cell(row: &[Value], index: usize) -> Option<&Value> {
    row.get(index)
}

fn text_at(row: &[Value], index: usize) -> String {
    cell(row, index).map(cell_to_string).unwrap_or_default()
}

/// Parse the guest sheet body. Fully blank rows are dropped; rows missing a
/// name or invite code are kept so the importer can count them.
pub fn parse_roster_values(values: &[Vec<Value>]) -> Vec<RosterRow> {
    values
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|v| !cell_to_string(v).is_empty()))
        .map(|(i, row)| {
            let confirmed_adults = cell(row, ROSTER_CONFIRMED_ADULTS)
                .filter(|v| !cell_to_string(v).is_empty())
                .map(cell_to_int);
            RosterRow {
                sheet_row: FIRST_DATA_ROW + i as i64,
                invite_code: text_at(row, ROSTER_INVITE_CODE),
                name: text_at(row, ROSTER_NAME),
                couple_flag: text_at(row, ROSTER_COUPLE),
                kid_count: cell(row, ROSTER_KIDS).map(cell_to_int).unwrap_or(0),
                confirmed_adults,
            }
        })
        .collect()
}

/// Parse the schedule sheet body, padding short rows with empty cells.
pub fn parse_schedule_values(values: &[Vec<Value>]) -> Vec<RawScheduleRow> {
    values
        .iter()
        .map(|row| RawScheduleRow {
            start_time: text_at(row, 0),
            end_time: text_at(row, 1),
            public: text_at(row, 2),
            name_es: text_at(row, 3),
            team: text_at(row, 4),
            location: text_at(row, 5),
            description_es: text_at(row, 6),
            name_en: text_at(row, 7),
            name_ca: text_at(row, 8),
            description_en: text_at(row, 9),
            description_ca: text_at(row, 10),
        })
        .collect()
}

/// Cells I..O for one guest, blanks for absent values.
pub fn response_values(response: &ResponseRow) -> Vec<Value> {
    fn int(v: Option<i64>) -> Value {
        v.map(Value::from).unwrap_or_else(|| Value::from(""))
    }
    fn text(v: &Option<String>) -> Value {
        Value::from(v.clone().unwrap_or_default())
    }

    vec![
        int(response.confirmed_adults),
        int(response.confirmed_kids),
        text(&response.dietary_info),
        text(&response.message_for_us),
        text(&response.song_request),
        text(&response.response_country),
        text(&response.response_at),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(cells: &[&str]) -> Vec<Value> {
        cells.iter().map(|c| Value::from(*c)).collect()
    }

    #[test]
    fn test_ranges_quote_sheet_names() {
        assert_eq!(roster_read_range("Guests"), "'Guests'!A2:I");
        assert_eq!(schedule_read_range("Schedule"), "'Schedule'!A2:K");
        assert_eq!(response_write_range("Guests", 14), "'Guests'!I14:O14");
        assert_eq!(roster_read_range("Ana's list"), "'Ana''s list'!A2:I");
    }

    #[test]
    fn test_cell_to_int_leading_integer() {
        assert_eq!(cell_to_int(&json!("3")), 3);
        assert_eq!(cell_to_int(&json!(" 2 nens")), 2);
        assert_eq!(cell_to_int(&json!("")), 0);
        assert_eq!(cell_to_int(&json!("cap")), 0);
        assert_eq!(cell_to_int(&json!(4)), 4);
        assert_eq!(cell_to_int(&json!(2.0)), 2);
        assert_eq!(cell_to_int(&json!(null)), 0);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&json!("  Ana  ")), "Ana");
        assert_eq!(cell_to_string(&json!(true)), "TRUE");
        assert_eq!(cell_to_string(&json!(12)), "12");
        assert_eq!(cell_to_string(&json!(null)), "");
    }

    #[test]
    fn test_couple_flag_values() {
        for yes in ["Si", "sí", "SÍ", "yes", "TRUE", "x", " X "] {
            assert!(is_couple_flag(yes), "{yes} should read as a couple");
        }
        for no in ["No", "", "n", "false", "2"] {
            assert!(!is_couple_flag(no), "{no} should not read as a couple");
        }
    }

    #[test]
    fn test_parse_roster_values_maps_columns_and_rows() {
        let values = vec![
            row(&["Ana & Joan", "Si", "2", "BCN", "", "", "", "ABC123"]),
            vec![],
            row(&["Marta", "No", "", "", "", "", "", "XYZ789", "1"]),
            row(&["", "", "", "", "", "", "", "NONAME"]),
        ];

        let rows = parse_roster_values(&values);
        assert_eq!(rows.len(), 3, "fully blank row is dropped");

        assert_eq!(rows[0].sheet_row, 2);
        assert_eq!(rows[0].invite_code, "ABC123");
        assert_eq!(rows[0].name, "Ana & Joan");
        assert_eq!(rows[0].couple_flag, "Si");
        assert_eq!(rows[0].kid_count, 2);
        assert_eq!(rows[0].confirmed_adults, None);

        assert_eq!(rows[1].sheet_row, 4);
        assert_eq!(rows[1].kid_count, 0);
        assert_eq!(rows[1].confirmed_adults, Some(1));

        assert_eq!(rows[2].sheet_row, 5);
        assert!(rows[2].name.is_empty());
    }

    #[test]
    fn test_parse_schedule_values_pads_short_rows() {
        let values = vec![
            row(&["", "", "", "Friday Dec 18"]),
            vec![
                json!("4:00 PM"),
                json!("6:00 PM"),
                json!(true),
                json!("Ceremonia"),
                json!("Planner"),
                json!("Jardín"),
            ],
        ];
        let rows = parse_schedule_values(&values);
        assert_eq!(rows[0].name_es, "Friday Dec 18");
        assert!(rows[0].start_time.is_empty());
        assert_eq!(rows[1].public, "TRUE");
        assert_eq!(rows[1].location, "Jardín");
        assert!(rows[1].description_ca.is_empty());
    }

    #[test]
    fn test_response_values_order_and_blanks() {
        let response = ResponseRow {
            confirmed_adults: Some(2),
            confirmed_kids: None,
            dietary_info: Some("vegetarian".to_string()),
            message_for_us: None,
            song_request: Some("Vivir mi vida".to_string()),
            response_country: Some("ES".to_string()),
            response_at: Some("2026-10-01T10:00:00.000000Z".to_string()),
        };
        let cells = response_values(&response);
        assert_eq!(cells.len(), 7);
        assert_eq!(cells[0], json!(2));
        assert_eq!(cells[1], json!(""));
        assert_eq!(cells[2], json!("vegetarian"));
        assert_eq!(cells[5], json!("ES"));
        assert_eq!(cells[6], json!("2026-10-01T10:00:00.000000Z"));
    }
}
