//! CSV renderings of the query log and of a single result.

use crate::db::result::{QueryResult, QueryStatus};
use crate::session::analytics::QueryLogEntry;
use serde_json::Value;

const ANSWER_PREVIEW_CHARS: usize = 100;

pub fn query_log_csv(entries: &[QueryLogEntry]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["timestamp", "question", "answer", "sql", "status", "elapsed_ms", "cached"])?;

    for entry in entries {
        let status = match entry.status {
            QueryStatus::Ok => "ok",
            QueryStatus::Empty => "empty",
            QueryStatus::Error => "error",
        };
        writer.write_record([
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.question.clone(),
            preview(&entry.answer),
            entry.sql.clone().unwrap_or_default(),
            status.to_string(),
            entry.elapsed_ms.to_string(),
            entry.cached.to_string(),
        ])?;
    }

    finish(writer)
}

/// Header row from the result columns, one record per row; NULL becomes an empty field.
pub fn result_csv(result: &QueryResult) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(result.columns.iter().map(|c| c.name.as_str()))?;

    for row in &result.rows {
        writer.write_record(result.columns.iter().map(|c| match row.get(&c.name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }))?;
    }

    finish(writer)
}

fn preview(answer: &str) -> String {
    match answer.char_indices().nth(ANSWER_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &answer[..cut]),
        None => answer.to_string(),
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, csv::Error> {
    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::result::ResultColumn;
    use crate::db::schema::DataType;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn long_answers_are_shortened_in_the_log_export() {
        let entry = QueryLogEntry {
            question: "Show, with commas".to_string(),
            answer: "a".repeat(150),
            sql: Some("SELECT 1".to_string()),
            status: QueryStatus::Ok,
            elapsed_ms: 12,
            cached: false,
            timestamp: Utc::now(),
        };
        let csv = query_log_csv(&[entry]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,question,answer,sql,status,elapsed_ms,cached"
        );
        let record = lines.next().unwrap();
        assert!(record.contains("\"Show, with commas\""));
        assert!(record.contains(&format!("{}...", "a".repeat(100))));
        assert!(!record.contains(&"a".repeat(101)));
        assert!(record.ends_with(",SELECT 1,ok,12,false"));
    }

    #[test]
    fn result_rows_follow_column_order() {
        let result = QueryResult::from_rows(
            vec![
                ResultColumn {
                    name: "name".to_string(),
                    data_type: DataType::String,
                },
                ResultColumn {
                    name: "age".to_string(),
                    data_type: DataType::Integer,
                },
            ],
            vec![
                json!({"age": 20, "name": "Ann"}).as_object().cloned().unwrap(),
                json!({"age": null, "name": "Bo"}).as_object().cloned().unwrap(),
            ],
            false,
            3,
        );
        assert_eq!(result_csv(&result).unwrap(), "name,age\nAnn,20\nBo,\n");
    }
}
