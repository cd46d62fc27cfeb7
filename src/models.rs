// Data model for checklist todos

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Forward window for the "due soon" predicate (inclusive).
pub const DUE_SOON_DAYS: i64 = 7;

/// A single todo item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Explicit rank used only for sort comparisons (storage carries no ordering)
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    /// Title-cased display name
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    /// Case-insensitive, converting at the boundary (canonical form is lowercase)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other} (expected low/medium/high)")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Todo {
    /// Create a new todo with a fresh UUIDv7 id and current timestamps
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            category: None,
            completed: false,
            created_at: now,
            updated_at: now,
            due_date: None,
        }
    }

    /// Overdue: due strictly in the past and not completed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => !self.completed && due < now,
            None => false,
        }
    }

    /// Due soon: due within the next `DUE_SOON_DAYS` days (inclusive) and not completed
    pub fn is_due_soon(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => !self.completed && due >= now && due <= now + Duration::days(DUE_SOON_DAYS),
            None => false,
        }
    }

    /// Whether the description is present and non-blank
    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    /// Whether the category is present and non-blank
    pub fn has_category(&self) -> bool {
        self.category.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Bump `updated_at`, preserving the `updated_at >= created_at` invariant
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_priority_serialization() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");

        let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, Priority::Low);
    }

    #[test]
    fn test_priority_rank_ordering() {
        assert!(Priority::Low.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::High.rank());
    }

    #[test]
    fn test_priority_from_str_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("Medium".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_new_todo_defaults() {
        let todo = Todo::new("Buy milk");
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.priority, Priority::Medium);
        assert!(!todo.completed);
        assert!(todo.due_date.is_none());
        assert_eq!(todo.created_at, todo.updated_at);
        assert!(!todo.id.is_empty());
    }

    #[test]
    fn test_overdue() {
        let now = fixed_now();
        let mut todo = Todo::new("Report");
        todo.due_date = Some(now - Duration::hours(1));
        assert!(todo.is_overdue(now));

        // Completed tasks are never overdue
        todo.completed = true;
        assert!(!todo.is_overdue(now));

        // Future due date is not overdue
        todo.completed = false;
        todo.due_date = Some(now + Duration::hours(1));
        assert!(!todo.is_overdue(now));

        // No due date is not overdue
        todo.due_date = None;
        assert!(!todo.is_overdue(now));
    }

    #[test]
    fn test_due_soon_window_is_inclusive() {
        let now = fixed_now();
        let mut todo = Todo::new("Taxes");

        todo.due_date = Some(now + Duration::days(DUE_SOON_DAYS));
        assert!(todo.is_due_soon(now));

        todo.due_date = Some(now + Duration::days(DUE_SOON_DAYS) + Duration::seconds(1));
        assert!(!todo.is_due_soon(now));

        todo.due_date = Some(now);
        assert!(todo.is_due_soon(now));

        // Past due dates are overdue, not due soon
        todo.due_date = Some(now - Duration::seconds(1));
        assert!(!todo.is_due_soon(now));

        // Completion excludes a task from due soon
        todo.due_date = Some(now + Duration::days(1));
        todo.completed = true;
        assert!(!todo.is_due_soon(now));
    }

    #[test]
    fn test_blank_description_does_not_count() {
        let mut todo = Todo::new("Note");
        assert!(!todo.has_description());
        todo.description = Some("   ".to_string());
        assert!(!todo.has_description());
        todo.description = Some("details".to_string());
        assert!(todo.has_description());
    }

    #[test]
    fn test_todo_round_trip() {
        let mut todo = Todo::new("Round trip");
        todo.description = Some("with fields".to_string());
        todo.category = Some("Work".to_string());
        todo.due_date = Some(fixed_now());

        let json = serde_json::to_string(&todo).unwrap();
        let back: Todo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, todo);
    }
}
