use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Maximum task length in characters, counted after trimming.
pub const TASK_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// A stored todo. `full_date_time` is a projection over `(date, time)`,
/// recomputed whenever a record is read or written, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: i64,
    pub task: String,
    pub date: NaiveDate,
    pub time: String,
    pub completed: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub full_date_time: String,
}

/// Input for a new todo. A missing `date` falls back to the current UTC
/// calendar date at insertion time.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub task: String,
    pub date: Option<NaiveDate>,
    pub time: String,
    pub priority: Priority,
}

/// Partial update: only the fields that are `Some` are applied, the rest of
/// the record is left untouched.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub task: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
}

/// List filter. Fields are optional and combined with logical AND.
#[derive(Debug, Clone, Copy, Default)]
pub struct TodoFilter {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub date: Option<NaiveDate>,
}

/// Strict `HH:MM` 24-hour check: hours 00-23, minutes 00-59, zero-padded.
pub fn is_valid_time(value: &str) -> bool {
    let b = value.as_bytes();
    b.len() == 5
        && b[2] == b':'
        && b.iter().enumerate().all(|(i, c)| i == 2 || c.is_ascii_digit())
        && (b[0] - b'0') * 10 + (b[1] - b'0') <= 23
        && b[3] - b'0' <= 5
}

/// Check the record-level constraints on `task` (already trimmed) and `time`,
/// collecting every violation so the caller can report them all at once.
pub fn validate_fields(task: &str, time: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if task.is_empty() {
        errors.push("Task must be at least 1 character long.".to_string());
    } else if task.chars().count() > TASK_MAX_LEN {
        errors.push(format!("Task must be at most {TASK_MAX_LEN} characters long."));
    }
    if !is_valid_time(time) {
        errors.push("Invalid time format, expected HH:MM (e.g. 14:30).".to_string());
    }
    errors
}

pub fn full_date_time(date: NaiveDate, time: &str) -> String {
    format!("{date} {time}")
}
