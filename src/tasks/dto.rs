use serde::Deserialize;
use time::{macros::format_description, Date};

use super::repo_types::{Priority, TaskStatus};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
}

pub fn parse_due_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::Validation("dueDate must be YYYY-MM-DD".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn parses_iso_date() {
        let d = parse_due_date("2024-12-31").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, Month::December, 31));
    }

    #[test]
    fn rejects_other_formats() {
        assert!(parse_due_date("31/12/2024").is_err());
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(req.priority.is_none());
        assert!(req.status.is_none());
    }

    #[test]
    fn status_uses_kebab_case() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title":"x","status":"in-progress","priority":"high"}"#).unwrap();
        assert_eq!(req.status, Some(TaskStatus::InProgress));
        assert_eq!(req.priority, Some(Priority::High));
    }
}
