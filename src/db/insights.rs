use crate::db::schema::SchemaDescription;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableShare {
    pub table: String,
    pub records: u64,
    pub columns: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseInsights {
    pub table_count: usize,
    pub total_records: u64,
    pub largest_table: Option<TableShare>,
    pub average_columns: f64,
    /// Sorted by record count, largest first.
    pub distribution: Vec<TableShare>,
    pub suggestions: Vec<String>,
    /// Human readable summary lines for the overview panel.
    pub headlines: Vec<String>,
}

impl DatabaseInsights {
    pub fn from_schema(schema: &SchemaDescription) -> Self {
        let total_records: u64 = schema.tables.iter().map(|t| t.row_count).sum();

        let mut distribution: Vec<TableShare> = schema
            .tables
            .iter()
            .map(|t| TableShare {
                table: t.name.clone(),
                records: t.row_count,
                columns: t.columns.len(),
                percentage: if total_records > 0 {
                    t.row_count as f64 / total_records as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();
        // stable sort keeps catalog order among equal counts
        distribution.sort_by(|a, b| b.records.cmp(&a.records));

        let average_columns = if schema.tables.is_empty() {
            0.0
        } else {
            schema.tables.iter().map(|t| t.columns.len()).sum::<usize>() as f64
                / schema.tables.len() as f64
        };

        let largest_table = distribution.first().cloned();
        let mut headlines = Vec::new();
        if let Some(largest) = &largest_table {
            headlines.push(format!(
                "Largest table: {} ({} records)",
                largest.table, largest.records
            ));
        }
        headlines.push(format!("Total records: {}", total_records));
        if !schema.tables.is_empty() {
            headlines.push(format!("Average columns per table: {:.1}", average_columns));
        }

        Self {
            table_count: schema.tables.len(),
            total_records,
            largest_table,
            average_columns,
            distribution,
            suggestions: suggestions(schema),
            headlines,
        }
    }
}

/// Starter questions offered before the first question is asked.
pub fn suggestions(schema: &SchemaDescription) -> Vec<String> {
    match schema.tables.first() {
        Some(first) => vec![
            format!("Show all {} data", first.name),
            "List table names".to_string(),
            format!("Count {} records", first.name),
            "Summarise the database".to_string(),
        ],
        None => vec![
            "List all tables".to_string(),
            "Summarise the database".to_string(),
            "Show database structure".to_string(),
            "Count total records".to_string(),
        ],
    }
}
