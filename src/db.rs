use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, types::Value, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::models::{
    full_date_time, validate_fields, NewTodo, Priority, Todo, TodoFilter, TodoPatch,
};

const COLUMNS: &str = "id, task, date, time, completed, priority, created_at, updated_at";

/// Keyed todo collection over SQLite. The single connection sits behind a
/// mutex, so every read-modify-write (update, toggle) is serialized per
/// store, and `AUTOINCREMENT` ids are never reused after deletion.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Ephemeral store, one per call. Used for test isolation.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                priority TEXT NOT NULL DEFAULT 'medium',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_todos_date_time ON todos(date, time);
            CREATE INDEX IF NOT EXISTS idx_todos_completed ON todos(completed);
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, new: NewTodo) -> Result<Todo, StoreError> {
        let task = new.task.trim().to_string();
        let errors = validate_fields(&task, &new.time);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        let now = Utc::now();
        let date = new.date.unwrap_or_else(|| now.date_naive());
        let conn = self.conn();
        conn.execute(
            "INSERT INTO todos (task, date, time, completed, priority, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)",
            params![task, date.to_string(), new.time, new.priority.as_str(), now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Todo {
            id,
            full_date_time: full_date_time(date, &new.time),
            task,
            date,
            time: new.time,
            completed: false,
            priority: new.priority,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        Ok(get_todo(&self.conn(), id)?)
    }

    /// Filtered, ordered listing. Filter fields are ANDed; the `date` field
    /// matches the whole calendar day. Results are sorted by `(date, time)`
    /// ascending with ties broken by insertion order.
    pub fn find_all(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(completed) = filter.completed {
            clauses.push("completed = ?");
            values.push(Value::from(completed));
        }
        if let Some(priority) = filter.priority {
            clauses.push("priority = ?");
            values.push(Value::from(priority.as_str().to_string()));
        }
        if let Some(date) = filter.date {
            clauses.push("date >= ? AND date < ?");
            values.push(Value::from(date.to_string()));
            let next_day = date.succ_opt().unwrap_or(NaiveDate::MAX);
            values.push(Value::from(next_day.to_string()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM todos{where_clause} ORDER BY date ASC, time ASC, id ASC"
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), row_to_todo)?;

        let mut todos = Vec::new();
        for todo in rows {
            todos.push(todo?);
        }
        Ok(todos)
    }

    /// Partial update: merges the patch into the current record, revalidates
    /// the merged whole, and persists with a fresh `updated_at`. The mutex is
    /// held across the read and the write.
    pub fn update(&self, id: i64, patch: TodoPatch) -> Result<Option<Todo>, StoreError> {
        let conn = self.conn();
        let Some(mut todo) = get_todo(&conn, id)? else {
            return Ok(None);
        };

        if let Some(task) = patch.task {
            todo.task = task;
        }
        if let Some(date) = patch.date {
            todo.date = date;
        }
        if let Some(time) = patch.time {
            todo.time = time;
        }
        if let Some(priority) = patch.priority {
            todo.priority = priority;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }

        todo.task = todo.task.trim().to_string();
        let errors = validate_fields(&todo.task, &todo.time);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        todo.updated_at = Utc::now();
        todo.full_date_time = full_date_time(todo.date, &todo.time);
        conn.execute(
            "UPDATE todos SET task = ?1, date = ?2, time = ?3, completed = ?4, priority = ?5,
             updated_at = ?6 WHERE id = ?7",
            params![
                todo.task,
                todo.date.to_string(),
                todo.time,
                todo.completed,
                todo.priority.as_str(),
                todo.updated_at.to_rfc3339(),
                id
            ],
        )?;
        Ok(Some(todo))
    }

    /// Flip `completed` for one record. Read and write happen under the same
    /// lock, so concurrent toggles never lose a flip.
    pub fn toggle_completed(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        let conn = self.conn();
        let Some(mut todo) = get_todo(&conn, id)? else {
            return Ok(None);
        };

        todo.completed = !todo.completed;
        todo.updated_at = Utc::now();
        conn.execute(
            "UPDATE todos SET completed = ?1, updated_at = ?2 WHERE id = ?3",
            params![todo.completed, todo.updated_at.to_rfc3339(), id],
        )?;
        Ok(Some(todo))
    }

    pub fn delete_by_id(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        let conn = self.conn();
        let Some(todo) = get_todo(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        Ok(Some(todo))
    }

    pub fn delete_all(&self) -> Result<usize, StoreError> {
        let removed = self.conn().execute("DELETE FROM todos", [])?;
        Ok(removed)
    }
}

fn get_todo(conn: &Connection, id: i64) -> rusqlite::Result<Option<Todo>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM todos WHERE id = ?1"),
        params![id],
        row_to_todo,
    )
    .optional()
}

fn row_to_todo(row: &Row) -> rusqlite::Result<Todo> {
    let date = parse_date(&row.get::<_, String>(2)?);
    let time: String = row.get(3)?;
    Ok(Todo {
        id: row.get(0)?,
        task: row.get(1)?,
        full_date_time: full_date_time(date, &time),
        date,
        time,
        completed: row.get(4)?,
        priority: Priority::parse(&row.get::<_, String>(5)?).unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn parse_date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_datetime(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn new_todo(task: &str, day: &str, time: &str, priority: Priority) -> NewTodo {
        NewTodo {
            task: task.to_string(),
            date: Some(date(day)),
            time: time.to_string(),
            priority,
        }
    }

    #[test]
    fn insert_fills_defaults_and_round_trips() {
        let db = store();
        let created = db
            .insert(new_todo("  Buy milk  ", "2026-03-01", "09:00", Priority::Medium))
            .unwrap();

        assert_eq!(created.task, "Buy milk");
        assert!(!created.completed);
        assert_eq!(created.full_date_time, "2026-03-01 09:00");

        let fetched = db.find_by_id(created.id).unwrap().unwrap();
        assert_eq!(fetched.task, "Buy milk");
        assert_eq!(fetched.date, date("2026-03-01"));
        assert_eq!(fetched.time, "09:00");
        assert_eq!(fetched.priority, Priority::Medium);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[test]
    fn insert_defaults_date_to_today() {
        let db = store();
        let created = db
            .insert(NewTodo {
                task: "No date given".to_string(),
                date: None,
                time: "12:00".to_string(),
                priority: Priority::Low,
            })
            .unwrap();
        assert_eq!(created.date, Utc::now().date_naive());
    }

    #[test]
    fn insert_rejects_invalid_records_without_persisting() {
        let db = store();
        for (task, time) in [("   ", "10:00"), ("Valid task", "24:00"), ("", "abc")] {
            let err = db
                .insert(new_todo(task, "2026-03-01", time, Priority::Medium))
                .unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
        assert!(db.find_all(&TodoFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn find_all_sorts_by_date_then_time_then_insertion() {
        let db = store();
        let late = db
            .insert(new_todo("later day", "2026-01-09", "20:00", Priority::Medium))
            .unwrap();
        let early = db
            .insert(new_todo("earlier day", "2026-01-08", "18:00", Priority::Medium))
            .unwrap();
        let tie = db
            .insert(new_todo("same slot", "2026-01-08", "18:00", Priority::Medium))
            .unwrap();

        let ids: Vec<i64> = db
            .find_all(&TodoFilter::default())
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![early.id, tie.id, late.id]);
    }

    #[test]
    fn priority_filters_partition_the_collection() {
        let db = store();
        for (task, priority) in [
            ("a", Priority::Low),
            ("b", Priority::Medium),
            ("c", Priority::High),
            ("d", Priority::High),
        ] {
            db.insert(new_todo(task, "2026-03-01", "10:00", priority)).unwrap();
        }

        let mut total = 0;
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            let matches = db
                .find_all(&TodoFilter {
                    priority: Some(priority),
                    ..TodoFilter::default()
                })
                .unwrap();
            assert!(matches.iter().all(|t| t.priority == priority));
            total += matches.len();
        }
        assert_eq!(total, 4);
    }

    #[test]
    fn date_filter_matches_the_whole_calendar_day() {
        let db = store();
        db.insert(new_todo("start of day", "2026-03-01", "00:00", Priority::Medium))
            .unwrap();
        db.insert(new_todo("end of day", "2026-03-01", "23:59", Priority::Medium))
            .unwrap();
        db.insert(new_todo("next day", "2026-03-02", "00:00", Priority::Medium))
            .unwrap();

        let filter = TodoFilter {
            date: Some(date("2026-03-01")),
            ..TodoFilter::default()
        };
        assert_eq!(db.find_all(&filter).unwrap().len(), 2);
    }

    #[test]
    fn filters_combine_with_and() {
        let db = store();
        let target = db
            .insert(new_todo("match", "2026-03-01", "10:00", Priority::High))
            .unwrap();
        db.insert(new_todo("wrong priority", "2026-03-01", "10:00", Priority::Low))
            .unwrap();
        db.insert(new_todo("wrong day", "2026-03-02", "10:00", Priority::High))
            .unwrap();

        let found = db
            .find_all(&TodoFilter {
                completed: Some(false),
                priority: Some(Priority::High),
                date: Some(date("2026-03-01")),
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, target.id);
    }

    #[test]
    fn update_applies_only_present_fields() {
        let db = store();
        let created = db
            .insert(new_todo("Buy milk", "2026-03-01", "09:00", Priority::High))
            .unwrap();

        let patch = TodoPatch {
            time: Some("15:00".to_string()),
            ..TodoPatch::default()
        };
        let updated = db.update(created.id, patch).unwrap().unwrap();

        assert_eq!(updated.time, "15:00");
        assert_eq!(updated.task, "Buy milk");
        assert_eq!(updated.date, created.date);
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.full_date_time, "2026-03-01 15:00");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn update_revalidates_the_merged_record() {
        let db = store();
        let created = db
            .insert(new_todo("Buy milk", "2026-03-01", "09:00", Priority::Medium))
            .unwrap();

        let err = db
            .update(
                created.id,
                TodoPatch {
                    time: Some("24:00".to_string()),
                    ..TodoPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = db
            .update(
                created.id,
                TodoPatch {
                    task: Some("   ".to_string()),
                    ..TodoPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // Failed updates leave the record untouched.
        let current = db.find_by_id(created.id).unwrap().unwrap();
        assert_eq!(current.task, "Buy milk");
        assert_eq!(current.time, "09:00");
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let db = store();
        assert!(db.update(9999, TodoPatch::default()).unwrap().is_none());
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let db = store();
        let created = db
            .insert(new_todo("flip me", "2026-03-01", "09:00", Priority::Medium))
            .unwrap();
        let other = db
            .insert(new_todo("leave me", "2026-03-01", "10:00", Priority::Medium))
            .unwrap();

        let once = db.toggle_completed(created.id).unwrap().unwrap();
        assert!(once.completed);
        let twice = db.toggle_completed(created.id).unwrap().unwrap();
        assert!(!twice.completed);

        // Exactly one record was touched.
        assert!(!db.find_by_id(other.id).unwrap().unwrap().completed);
        assert!(db.toggle_completed(9999).unwrap().is_none());
    }

    #[test]
    fn delete_removes_and_returns_the_record() {
        let db = store();
        let created = db
            .insert(new_todo("doomed", "2026-03-01", "09:00", Priority::Medium))
            .unwrap();

        let removed = db.delete_by_id(created.id).unwrap().unwrap();
        assert_eq!(removed.id, created.id);
        assert!(db.find_by_id(created.id).unwrap().is_none());
        assert!(db.delete_by_id(created.id).unwrap().is_none());
    }

    #[test]
    fn ids_are_never_reused_after_deletion() {
        let db = store();
        let first = db
            .insert(new_todo("first", "2026-03-01", "09:00", Priority::Medium))
            .unwrap();
        db.delete_by_id(first.id).unwrap();
        let second = db
            .insert(new_todo("second", "2026-03-01", "09:00", Priority::Medium))
            .unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn delete_all_reports_the_count() {
        let db = store();
        assert_eq!(db.delete_all().unwrap(), 0);
        for task in ["a", "b", "c"] {
            db.insert(new_todo(task, "2026-03-01", "09:00", Priority::Medium))
                .unwrap();
        }
        assert_eq!(db.delete_all().unwrap(), 3);
        assert!(db.find_all(&TodoFilter::default()).unwrap().is_empty());
    }
}
