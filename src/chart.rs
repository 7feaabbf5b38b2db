//! Picks a chart encoding for a tabular result from its shape alone.
//!
//! The rules form an ordered decision table; the first rule that matches wins:
//!
//! 1. zero or one row: table only
//! 2. one temporal column and one numeric measure: line
//! 3. one categorical column and one count/proportion measure, at most
//!    [`PIE_MAX_CATEGORIES`] distinct non-negative slices: pie
//! 4. one categorical column and one numeric measure, at most
//!    [`BAR_MAX_CATEGORIES`] distinct categories: bar
//! 5. anything else: table only

use crate::db::result::{QueryResult, QueryStatus, ResultColumn};
use crate::db::schema::{DataType, Row};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const BAR_MAX_CATEGORIES: usize = 20;
pub const PIE_MAX_CATEGORIES: usize = 8;

static TIME_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|_)(date|day|time|timestamp|month|year|week|quarter|period)(_|$|s$)")
        .expect("time column pattern is valid")
});

static SHARE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|_)(count|cnt|num|number|total|pct|percent|percentage|share|proportion|ratio|fraction)(_|$|s$|\()",
    )
        .expect("share column pattern is valid")
});

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}(-\d{2})?([ T]\d{2}:\d{2}(:\d{2}(\.\d+)?)?)?").expect("date pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    None,
    Bar,
    Line,
    Pie,
    TableOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl ChartSpec {
    pub fn none() -> Self {
        Self {
            kind: ChartKind::None,
            x: None,
            y: None,
        }
    }

    pub fn table_only() -> Self {
        Self {
            kind: ChartKind::TableOnly,
            x: None,
            y: None,
        }
    }

    fn axes(kind: ChartKind, x: &ResultColumn, y: &ResultColumn) -> Self {
        Self {
            kind,
            x: Some(x.name.clone()),
            y: Some(y.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Temporal,
    Measure,
    Category,
    Other,
}

/// Never fails: results that do not fit a chart fall back to table only,
/// and error results get no chart at all.
pub fn select_chart(result: &QueryResult) -> ChartSpec {
    if result.status == QueryStatus::Error || result.columns.is_empty() {
        return ChartSpec::none();
    }
    if result.rows.len() <= 1 || result.columns.len() != 2 {
        return ChartSpec::table_only();
    }

    let roles: Vec<Role> = result
        .columns
        .iter()
        .map(|c| role_of(c, &result.rows))
        .collect();

    let pick = |wanted: Role| -> Option<&ResultColumn> {
        roles
            .iter()
            .position(|r| *r == wanted)
            .map(|i| &result.columns[i])
    };

    if let (Some(time), Some(measure)) = (pick(Role::Temporal), pick(Role::Measure)) {
        return ChartSpec::axes(ChartKind::Line, time, measure);
    }

    if let (Some(category), Some(measure)) = (pick(Role::Category), pick(Role::Measure)) {
        let distinct = distinct_count(&result.rows, &category.name);

        if SHARE_NAME.is_match(&measure.name)
            && distinct <= PIE_MAX_CATEGORIES
            && all_non_negative(&result.rows, &measure.name)
        {
            return ChartSpec::axes(ChartKind::Pie, category, measure);
        }
        if distinct <= BAR_MAX_CATEGORIES {
            return ChartSpec::axes(ChartKind::Bar, category, measure);
        }
    }

    ChartSpec::table_only()
}

fn role_of(column: &ResultColumn, rows: &[Row]) -> Role {
    match &column.data_type {
        t if t.is_temporal() => Role::Temporal,
        t if t.is_numeric() => {
            if is_identifier(&column.name) {
                Role::Other
            } else if TIME_NAME.is_match(&column.name) && looks_like_year(rows, &column.name) {
                Role::Temporal
            } else {
                Role::Measure
            }
        }
        DataType::String => {
            if TIME_NAME.is_match(&column.name) || all_iso_dates(rows, &column.name) {
                Role::Temporal
            } else {
                Role::Category
            }
        }
        DataType::Boolean => Role::Category,
        _ => Role::Other,
    }
}

fn is_identifier(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "id" || lower.ends_with("_id")
}

fn looks_like_year(rows: &[Row], column: &str) -> bool {
    rows.iter().all(|row| match row.get(column) {
        Some(Value::Number(n)) => n.as_i64().is_some_and(|y| (1000..=9999).contains(&y)),
        Some(Value::Null) | None => true,
        _ => false,
    })
}

fn all_iso_dates(rows: &[Row], column: &str) -> bool {
    let mut seen = false;
    for row in rows {
        match row.get(column) {
            Some(Value::String(s)) => {
                if !ISO_DATE.is_match(s) {
                    return false;
                }
                seen = true;
            }
            Some(Value::Null) | None => {}
            _ => return false,
        }
    }
    seen
}

fn distinct_count(rows: &[Row], column: &str) -> usize {
    rows.iter()
        .map(|row| row.get(column).map(Value::to_string).unwrap_or_default())
        .collect::<HashSet<_>>()
        .len()
}

fn all_non_negative(rows: &[Row], column: &str) -> bool {
    rows.iter().all(|row| match row.get(column) {
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v >= 0.0),
        Some(Value::Null) | None => true,
        // decimals may arrive as strings
        Some(Value::String(s)) => s.parse::<f64>().is_ok_and(|v| v >= 0.0),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(columns: &[(&str, DataType)], rows: Vec<Value>) -> QueryResult {
        let columns = columns
            .iter()
            .map(|(n, t)| ResultColumn {
                name: n.to_string(),
                data_type: t.clone(),
            })
            .collect();
        let rows = rows
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        QueryResult::from_rows(columns, rows, false, 0)
    }

    #[test]
    fn single_row_is_table_only() {
        let r = result(
            &[("subject", DataType::String), ("avg_grade", DataType::Double)],
            vec![json!({"subject": "Math", "avg_grade": 80.0})],
        );
        assert_eq!(select_chart(&r).kind, ChartKind::TableOnly);
    }

    #[test]
    fn category_and_measure_is_bar() {
        let r = result(
            &[("subject", DataType::String), ("avg_grade", DataType::Double)],
            vec![
                json!({"subject": "Math", "avg_grade": 85.0}),
                json!({"subject": "Science", "avg_grade": 78.5}),
            ],
        );
        let spec = select_chart(&r);
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.x.as_deref(), Some("subject"));
        assert_eq!(spec.y.as_deref(), Some("avg_grade"));
    }

    #[test]
    fn count_by_small_category_is_pie() {
        let r = result(
            &[("grade", DataType::String), ("student_count", DataType::BigInt)],
            vec![
                json!({"grade": "A", "student_count": 4}),
                json!({"grade": "B", "student_count": 6}),
                json!({"grade": "C", "student_count": 2}),
            ],
        );
        assert_eq!(select_chart(&r).kind, ChartKind::Pie);
    }

    #[test]
    fn share_names_match_whole_words_only() {
        for name in ["student_count", "count", "count_star()", "count(*)", "num_students", "pct_total", "counts"] {
            assert!(SHARE_NAME.is_match(name), "{name}");
        }
        for name in ["account_balance", "discount", "country", "accounts", "numeric_score"] {
            assert!(!SHARE_NAME.is_match(name), "{name}");
        }
    }

    #[test]
    fn discount_by_small_category_is_bar_not_pie() {
        let r = result(
            &[("region", DataType::String), ("discount", DataType::Double)],
            vec![
                json!({"region": "north", "discount": 0.1}),
                json!({"region": "south", "discount": 0.2}),
            ],
        );
        assert_eq!(select_chart(&r).kind, ChartKind::Bar);
    }

    #[test]
    fn count_by_wide_category_falls_back_to_bar() {
        let rows = (0..12)
            .map(|i| json!({"department": format!("d{i}"), "count": i}))
            .collect();
        let r = result(&[("department", DataType::String), ("count", DataType::BigInt)], rows);
        assert_eq!(select_chart(&r).kind, ChartKind::Bar);
    }

    #[test]
    fn too_many_categories_is_table_only() {
        let rows = (0..25)
            .map(|i| json!({"name": format!("n{i}"), "score": i}))
            .collect();
        let r = result(&[("name", DataType::String), ("score", DataType::Integer)], rows);
        assert_eq!(select_chart(&r).kind, ChartKind::TableOnly);
    }

    #[test]
    fn date_axis_is_line() {
        let r = result(
            &[("order_date", DataType::Date), ("revenue", DataType::Double)],
            vec![
                json!({"order_date": "2024-01-01", "revenue": 10.0}),
                json!({"order_date": "2024-01-02", "revenue": 12.0}),
            ],
        );
        assert_eq!(select_chart(&r).kind, ChartKind::Line);
    }

    #[test]
    fn text_dates_and_year_numbers_are_time_axes() {
        let text = result(
            &[("semester_start", DataType::String), ("enrolled", DataType::BigInt)],
            vec![
                json!({"semester_start": "2025-01-15", "enrolled": 10}),
                json!({"semester_start": "2025-09-01", "enrolled": 12}),
            ],
        );
        assert_eq!(select_chart(&text).kind, ChartKind::Line);

        let years = result(
            &[("year", DataType::Integer), ("total", DataType::Double)],
            vec![json!({"year": 2023, "total": 1.0}), json!({"year": 2024, "total": 2.0})],
        );
        assert_eq!(select_chart(&years).kind, ChartKind::Line);
    }

    #[test]
    fn identifiers_are_not_measures() {
        let r = result(
            &[("student_id", DataType::Integer), ("name", DataType::String)],
            vec![json!({"student_id": 1, "name": "a"}), json!({"student_id": 2, "name": "b"})],
        );
        assert_eq!(select_chart(&r).kind, ChartKind::TableOnly);
    }

    #[test]
    fn wide_results_are_table_only() {
        let r = result(
            &[("id", DataType::Integer), ("name", DataType::String), ("grade", DataType::Integer)],
            vec![
                json!({"id": 1, "name": "Ann", "grade": 90}),
                json!({"id": 2, "name": "Bo", "grade": 80}),
                json!({"id": 3, "name": "Cy", "grade": 70}),
            ],
        );
        assert_eq!(select_chart(&r).kind, ChartKind::TableOnly);
    }

    #[test]
    fn errors_and_empty_results_never_fail() {
        let err = QueryResult::error(crate::db::result::QueryErrorKind::Syntax, "bad", 0);
        assert_eq!(select_chart(&err).kind, ChartKind::None);

        let empty = result(&[("a", DataType::String), ("b", DataType::Double)], vec![]);
        assert_eq!(select_chart(&empty).kind, ChartKind::TableOnly);

        let odd = result(
            &[("blob", DataType::Unknown("BLOB".into())), ("x", DataType::Boolean)],
            vec![json!({"blob": null, "x": true}), json!({"blob": [1], "x": false})],
        );
        assert_eq!(select_chart(&odd).kind, ChartKind::TableOnly);
    }
}
