//! Server-side task records.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

/// A task record as the server stores it.
pub type Record = Map<String, Value>;

const PRIORITIES: [&str; 3] = ["low", "medium", "high"];

/// Fields a client may not overwrite through PATCH.
const IMMUTABLE_FIELDS: [&str; 2] = ["id", "created_at"];

/// Server-side task table.
///
/// Records are kept newest first and stored as JSON objects, so the server
/// echoes back whatever extra fields a client sends.
#[derive(Debug, Default)]
pub struct TaskTable {
    records: RwLock<Vec<Record>>,
}

impl TaskTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding tasks `1..=count`.
    ///
    /// Counting from zero, every third task has no description and every
    /// fourth is completed, starting with task 1. Priorities cycle
    /// low/medium/high, creation times step back one hour per task and every
    /// task was last updated at `now`.
    pub fn seeded(count: usize, now: DateTime<Utc>) -> Self {
        let records = (0..count as i64)
            .map(|n| {
                let id = n + 1;
                let description = if n % 3 == 0 {
                    String::new()
                } else {
                    format!("Desc {id}")
                };
                let status = if n % 4 == 0 { "completed" } else { "pending" };
                let priority = PRIORITIES[n as usize % PRIORITIES.len()];

                let mut record = Record::new();
                record.insert("id".into(), Value::from(id));
                record.insert("title".into(), Value::from(format!("Seed {id}")));
                record.insert("description".into(), Value::from(description));
                record.insert("status".into(), Value::from(status));
                record.insert("priority".into(), Value::from(priority));
                record.insert("created_at".into(), timestamp(now - Duration::hours(n)));
                record.insert("updated_at".into(), timestamp(now));
                record
            })
            .collect();

        Self::from_records(records)
    }

    /// Creates a table holding the given records, in order.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns a copy of every record, in list order.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Returns the record with the given id.
    pub fn get(&self, id: i64) -> Option<Record> {
        self.records
            .read()
            .iter()
            .find(|record| record_id(record) == Some(id))
            .cloned()
    }

    /// Lists records matching the optional status and priority filters.
    pub fn list(&self, status: Option<&str>, priority: Option<&str>) -> Vec<Record> {
        self.records
            .read()
            .iter()
            .filter(|record| field_matches(record, "status", status))
            .filter(|record| field_matches(record, "priority", priority))
            .cloned()
            .collect()
    }

    /// Inserts a new record at the front and returns it.
    ///
    /// The id is one past the highest existing id. Client-supplied ids and
    /// timestamps are ignored; missing status and priority get defaults.
    pub fn insert(&self, mut body: Record, now: DateTime<Utc>) -> Record {
        let mut records = self.records.write();
        let id = records.iter().filter_map(record_id).max().unwrap_or(0) + 1;

        body.insert("id".into(), Value::from(id));
        body.entry("description").or_insert_with(|| Value::from(""));
        body.entry("status").or_insert_with(|| Value::from("pending"));
        body.entry("priority").or_insert_with(|| Value::from("medium"));
        body.insert("created_at".into(), timestamp(now));
        body.insert("updated_at".into(), timestamp(now));

        records.insert(0, body.clone());
        body
    }

    /// Merges `body` into the record with the given id and returns the
    /// result, or `None` if there is no such record.
    pub fn patch(&self, id: i64, body: Record, now: DateTime<Utc>) -> Option<Record> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|record| record_id(record) == Some(id))?;

        for (key, value) in body {
            if !IMMUTABLE_FIELDS.contains(&key.as_str()) {
                record.insert(key, value);
            }
        }
        record.insert("updated_at".into(), timestamp(now));
        Some(record.clone())
    }

    /// Removes the record with the given id. Returns true if it existed.
    pub fn remove(&self, id: i64) -> bool {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| record_id(record) != Some(id));
        records.len() != before
    }
}

/// Returns the numeric id of a record.
pub fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

fn field_matches(record: &Record, field: &str, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => record.get(field).and_then(Value::as_str) == Some(wanted),
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::from(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}
