use crate::db::result::ResultColumn;
use crate::db::schema::{DataType, Row};
use arrow::json::{writer::JsonArray, WriterBuilder};
use arrow::record_batch::RecordBatch;
use duckdb::Statement;
use std::error::Error;

pub struct CollectedRows {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Row>,
    pub truncated: bool,
}

/// Runs a prepared statement and keeps at most `cap` rows.
pub fn collect_rows(
    stmt: &mut Statement<'_>,
    cap: usize,
) -> Result<CollectedRows, Box<dyn Error + Send + Sync>> {
    let arrow_batch = stmt.query_arrow([])?;
    let schema = arrow_batch.get_schema();

    let columns = schema
        .fields()
        .iter()
        .map(|field| ResultColumn {
            name: field.name().clone(),
            data_type: DataType::from_arrow(field.data_type()),
        })
        .collect::<Vec<_>>();

    let mut kept: Vec<RecordBatch> = Vec::new();
    let mut kept_rows = 0usize;
    let mut truncated = false;

    for batch in arrow_batch {
        if kept_rows >= cap {
            if batch.num_rows() > 0 {
                truncated = true;
                break;
            }
            continue;
        }
        let remaining = cap - kept_rows;
        if batch.num_rows() > remaining {
            kept.push(batch.slice(0, remaining));
            kept_rows += remaining;
            truncated = true;
            break;
        }
        kept_rows += batch.num_rows();
        kept.push(batch);
    }

    let rows = batches_to_rows(&kept)?;
    Ok(CollectedRows {
        columns,
        rows,
        truncated,
    })
}

fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<Row>, Box<dyn Error + Send + Sync>> {
    if batches.iter().all(|b| b.num_rows() == 0) {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer.write_batches(&refs)?;
    writer.finish()?;

    let buffer = writer.into_inner();
    let rows: Vec<Row> = serde_json::from_slice(&buffer)?;
    Ok(rows)
}
