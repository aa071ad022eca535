use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{is_valid_time, NewTodo, Priority, TodoFilter, TodoPatch};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Bodies deserialize every field as an optional string so that a bad
/// priority, date, or time comes back as a 400 envelope with a message
/// instead of an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    task: Option<String>,
    date: Option<String>,
    time: Option<String>,
    priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    task: Option<String>,
    date: Option<String>,
    time: Option<String>,
    priority: Option<String>,
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    completed: Option<bool>,
    priority: Option<String>,
    date: Option<String>,
}

pub async fn create_todo(
    State(state): State<AppState>,
    Json(body): Json<CreateTodoRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let task = body
        .task
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Task is required.".to_string()))?;
    let date = body
        .date
        .ok_or_else(|| ApiError::BadRequest("Date is required.".to_string()))?;
    let time = body
        .time
        .ok_or_else(|| ApiError::BadRequest("Time is required.".to_string()))?;
    if !is_valid_time(&time) {
        return Err(ApiError::BadRequest(
            "Invalid time format, expected HH:MM (e.g. 14:30).".to_string(),
        ));
    }

    let date = parse_date(&date)?;
    let priority = match body.priority.as_deref() {
        Some(raw) => parse_priority(raw)?,
        None => Priority::default(),
    };

    let todo = state.db.insert(NewTodo {
        task,
        date: Some(date),
        time,
        priority,
    })?;
    tracing::debug!(id = todo.id, "todo created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Todo created.", "data": todo })),
    ))
}

pub async fn list_todos(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = TodoFilter {
        completed: query.completed,
        priority: query.priority.as_deref().map(parse_priority).transpose()?,
        date: query.date.as_deref().map(parse_date).transpose()?,
    };

    let todos = state.db.find_all(&filter)?;
    Ok(Json(
        json!({ "success": true, "count": todos.len(), "data": todos }),
    ))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let todo = state.db.find_by_id(id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "success": true, "data": todo })))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTodoRequest>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    if let Some(time) = body.time.as_deref() {
        if !is_valid_time(time) {
            return Err(ApiError::BadRequest(
                "Invalid time format, expected HH:MM (e.g. 14:30).".to_string(),
            ));
        }
    }

    let patch = TodoPatch {
        task: body.task,
        date: body.date.as_deref().map(parse_date).transpose()?,
        time: body.time,
        priority: body.priority.as_deref().map(parse_priority).transpose()?,
        completed: body.completed,
    };

    let todo = state.db.update(id, patch)?.ok_or(ApiError::NotFound)?;
    Ok(Json(
        json!({ "success": true, "message": "Todo updated.", "data": todo }),
    ))
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let todo = state.db.toggle_completed(id)?.ok_or(ApiError::NotFound)?;
    let message = if todo.completed {
        "Todo marked as completed."
    } else {
        "Todo marked as incomplete."
    };
    Ok(Json(
        json!({ "success": true, "message": message, "data": todo }),
    ))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let todo = state.db.delete_by_id(id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(
        json!({ "success": true, "message": "Todo deleted.", "data": todo }),
    ))
}

pub async fn delete_all_todos(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let count = state.db.delete_all()?;
    tracing::debug!(count, "todos cleared");
    Ok(Json(json!({
        "success": true,
        "count": count,
        "message": format!("Deleted {count} todos."),
    })))
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::MalformedId)
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("Invalid date format, expected YYYY-MM-DD.".to_string()))
}

fn parse_priority(raw: &str) -> Result<Priority, ApiError> {
    Priority::parse(raw).ok_or_else(|| {
        ApiError::BadRequest("Priority must be one of: low, medium, high.".to_string())
    })
}
