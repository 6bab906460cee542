use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::SeriesError;

/// One week's row. `values` is aligned with the table's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

/// Week-indexed table whose columns appear the first time a key is seen.
///
/// Rows are strictly increasing by date. Creating a column writes 0 into
/// every existing row, and a new row holds 0 for every column it does not
/// mention, so all rows always have one value per column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "TableData", into = "TableData")]
pub struct WideTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Row>,
}

/// Serialized shape of a `WideTable`.
#[derive(Serialize, Deserialize)]
struct TableData {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl From<WideTable> for TableData {
    fn from(t: WideTable) -> Self {
        TableData {
            columns: t.columns,
            rows: t.rows,
        }
    }
}

impl TryFrom<TableData> for WideTable {
    type Error = SeriesError;

    fn try_from(data: TableData) -> Result<Self, SeriesError> {
        let mut index = HashMap::with_capacity(data.columns.len());
        for (i, name) in data.columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SeriesError::Malformed(format!("duplicate column {name:?}")));
            }
        }
        for (i, row) in data.rows.iter().enumerate() {
            if row.values.len() != data.columns.len() {
                return Err(SeriesError::Malformed(format!(
                    "row {} has {} values for {} columns",
                    row.date,
                    row.values.len(),
                    data.columns.len()
                )));
            }
            if i > 0 && row.date <= data.rows[i - 1].date {
                return Err(SeriesError::Malformed(format!(
                    "rows out of order at {}",
                    row.date
                )));
            }
        }
        Ok(WideTable {
            columns: data.columns,
            index,
            rows: data.rows,
        })
    }
}

impl WideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn row(&self, date: NaiveDate) -> Option<&Row> {
        self.rows
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn value(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let col = *self.index.get(column)?;
        self.row(date).map(|r| r.values[col])
    }

    /// Fail unless `date` is strictly after the latest row.
    pub fn check_append(&self, date: NaiveDate) -> Result<(), SeriesError> {
        match self.latest_date() {
            Some(latest) if date <= latest => Err(SeriesError::OrderingViolation { date, latest }),
            _ => Ok(()),
        }
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.columns.len();
        self.columns.push(name.to_string());
        self.index.insert(name.to_string(), i);
        for row in &mut self.rows {
            row.values.push(0.0);
        }
        i
    }

    /// Append a row for `date`. Unmentioned columns read 0.
    pub fn push_row<'a, I>(&mut self, date: NaiveDate, values: I) -> Result<(), SeriesError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        self.check_append(date)?;

        let mut row = vec![0.0; self.columns.len()];
        for (name, value) in values {
            let col = self.ensure_column(name);
            if col == row.len() {
                row.push(0.0);
            }
            row[col] = value;
        }
        self.rows.push(Row { date, values: row });
        Ok(())
    }

    /// Append every row of a later table, matching columns by name.
    pub fn append(&mut self, other: &WideTable) -> Result<(), SeriesError> {
        if let Some(first) = other.first_date() {
            self.check_append(first)?;
        }
        for row in &other.rows {
            let values = other
                .columns
                .iter()
                .map(String::as_str)
                .zip(row.values.iter().copied());
            self.push_row(row.date, values)?;
        }
        Ok(())
    }

    /// The `n` largest columns of one row, largest first.
    pub fn top_columns(&self, date: NaiveDate, n: usize) -> Vec<(&str, f64)> {
        let Some(row) = self.row(date) else {
            return Vec::new();
        };
        let mut pairs: Vec<(&str, f64)> = self
            .columns
            .iter()
            .map(String::as_str)
            .zip(row.values.iter().copied())
            .filter(|(_, v)| *v != 0.0)
            .collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        pairs.truncate(n);
        pairs
    }

    /// Row-oriented records: `{"<column>": value, ..., "date": "..."}`.
    /// The week key always wins over a column that happens to be named `date`.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = serde_json::Map::with_capacity(self.columns.len() + 1);
                for (name, value) in self.columns.iter().zip(&row.values) {
                    record.insert(name.clone(), (*value).into());
                }
                record.insert("date".to_string(), row.date.to_string().into());
                serde_json::Value::Object(record)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    #[test]
    fn test_new_column_backfills_zero() {
        let mut t = WideTable::new();
        t.push_row(day(7), [("A", 100.0)]).unwrap();
        t.push_row(day(14), [("B", 50.0)]).unwrap();

        assert_eq!(t.columns(), ["A", "B"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(day(7), "B"), Some(0.0));
        assert_eq!(t.value(day(14), "A"), Some(0.0));
        assert_eq!(t.value(day(14), "B"), Some(50.0));
        assert!(t.rows().iter().all(|r| r.values.len() == 2));
    }

    #[test]
    fn test_out_of_order_rejected_and_unchanged() {
        let mut t = WideTable::new();
        t.push_row(day(7), [("A", 1.0)]).unwrap();
        t.push_row(day(21), [("A", 3.0)]).unwrap();
        let before = t.clone();

        let err = t.push_row(day(14), [("B", 2.0)]).unwrap_err();
        assert_eq!(err, SeriesError::OrderingViolation { date: day(14), latest: day(21) });
        assert!(t.push_row(day(21), [("A", 9.0)]).is_err());
        assert_eq!(t, before);
    }

    #[test]
    fn test_append_table_zero_fills_both_ways() {
        let mut old = WideTable::new();
        old.push_row(day(7), [("A", 1.0), ("B", 2.0)]).unwrap();
        let mut fresh = WideTable::new();
        fresh.push_row(day(14), [("C", 3.0)]).unwrap();

        old.append(&fresh).unwrap();
        assert_eq!(old.columns(), ["A", "B", "C"]);
        assert_eq!(old.value(day(7), "C"), Some(0.0));
        assert_eq!(old.value(day(14), "A"), Some(0.0));
        assert_eq!(old.value(day(14), "C"), Some(3.0));

        assert!(old.append(&fresh).is_err());
    }

    #[test]
    fn test_serde_roundtrip_and_validation() {
        let mut t = WideTable::new();
        t.push_row(day(7), [("love", 0.02)]).unwrap();
        t.push_row(day(14), [("rain", 0.01)]).unwrap();

        let json = serde_json::to_string(&t).unwrap();
        let back: WideTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.value(day(7), "rain"), Some(0.0));

        let bad = r#"{"columns": ["a"], "rows": [{"date": "2023-01-07", "values": [1.0, 2.0]}]}"#;
        assert!(serde_json::from_str::<WideTable>(bad).is_err());
        let unordered = r#"{"columns": ["a"], "rows": [
            {"date": "2023-01-14", "values": [1.0]},
            {"date": "2023-01-07", "values": [1.0]}]}"#;
        assert!(serde_json::from_str::<WideTable>(unordered).is_err());
    }

    #[test]
    fn test_records_and_top_columns() {
        let mut t = WideTable::new();
        t.push_row(day(7), [("A", 10.0), ("B", 90.0), ("C", 50.0)]).unwrap();

        let records = t.to_records();
        assert_eq!(records[0]["date"], "2023-01-07");
        assert_eq!(records[0]["B"], 90.0);

        let top = t.top_columns(day(7), 2);
        assert_eq!(top, vec![("B", 90.0), ("C", 50.0)]);
        assert!(t.top_columns(day(8), 2).is_empty());
    }

    #[test]
    fn test_records_keep_week_key_over_date_column() {
        let mut t = WideTable::new();
        t.push_row(day(7), [("date", 0.02), ("love", 0.05)]).unwrap();

        let records = t.to_records();
        assert_eq!(records[0]["date"], "2023-01-07");
        assert_eq!(records[0]["love"], 0.05);
        assert_eq!(t.value(day(7), "date"), Some(0.02));
    }
}
