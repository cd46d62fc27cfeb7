// Filter specification for querying todos
//
// A `TodoFilter` is a pure value: building one never touches the todo
// collection, and the engine never mutates it. The whole filter round-trips
// through `to_text`/`from_text` for presets and clipboard exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Priority;

/// Result cap applied when the caller does not choose one.
pub const DEFAULT_MAX_RESULTS: i64 = 100;

/// Inclusive timestamp range with independently optional bounds.
///
/// An absent bound is unbounded on that side; a range with both bounds
/// absent imposes no constraint at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// True when neither bound is set, i.e. the clause is a no-op
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if instant < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if instant > end {
                return false;
            }
        }
        true
    }
}

/// Three-valued boolean clause: don't care, require true, require false.
///
/// Encoded as `null` / `true` / `false` in the filter document, so the
/// "don't care" state is explicit rather than a missing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriState {
    #[default]
    Any,
    Yes,
    No,
}

impl TriState {
    pub fn accepts(self, value: bool) -> bool {
        match self {
            TriState::Any => true,
            TriState::Yes => value,
            TriState::No => !value,
        }
    }

    pub fn is_set(self) -> bool {
        self != TriState::Any
    }
}

impl Serialize for TriState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TriState::Any => serializer.serialize_none(),
            TriState::Yes => serializer.serialize_bool(true),
            TriState::No => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<bool>::deserialize(deserializer)? {
            None => TriState::Any,
            Some(true) => TriState::Yes,
            Some(false) => TriState::No,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Created,
    Updated,
    Title,
    Priority,
    DueDate,
    Category,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(SortKey::Created),
            "updated" => Ok(SortKey::Updated),
            "title" => Ok(SortKey::Title),
            "priority" => Ok(SortKey::Priority),
            "due" | "due_date" | "due-date" => Ok(SortKey::DueDate),
            "category" => Ok(SortKey::Category),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    #[default]
    None,
    Category,
    Priority,
    Status,
    DueDate,
}

impl GroupKey {
    fn display_name(self) -> &'static str {
        match self {
            GroupKey::None => "none",
            GroupKey::Category => "category",
            GroupKey::Priority => "priority",
            GroupKey::Status => "status",
            GroupKey::DueDate => "due date",
        }
    }
}

impl std::str::FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(GroupKey::None),
            "category" => Ok(GroupKey::Category),
            "priority" => Ok(GroupKey::Priority),
            "status" => Ok(GroupKey::Status),
            "due" | "due_date" | "due-date" => Ok(GroupKey::DueDate),
            other => Err(format!("unknown group key: {other}")),
        }
    }
}

/// The full filter/sort/group specification.
///
/// Every clause has a configuration that makes it a no-op (empty text,
/// empty set, unbounded range, `TriState::Any`), so a default filter
/// matches everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoFilter {
    /// Range on `due_date`; todos without a due date fail a bounded range
    pub due: DateRange,
    /// Range on `created_at`
    pub created: DateRange,
    /// Range on `updated_at`
    pub updated: DateRange,
    /// Range on the completion instant (`updated_at` of a completed todo).
    /// Incomplete todos fail this clause whenever it is bounded.
    pub completed_between: DateRange,

    /// Case-insensitive substring match on title
    pub title_contains: Option<String>,
    /// Case-insensitive substring match on description
    pub description_contains: Option<String>,
    /// Excludes todos whose title OR description contains this text
    pub exclude_text: Option<String>,

    /// Allowed priorities; empty means no restriction
    pub priorities: Vec<Priority>,
    /// Allowed categories; empty means no restriction
    pub categories: Vec<String>,
    /// Carried and round-tripped but never consumed by matching
    pub tags: Vec<String>,

    pub completion: CompletionFilter,

    pub has_description: TriState,
    pub has_due_date: TriState,
    pub has_category: TriState,
    pub overdue: TriState,
    pub due_soon: TriState,

    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub group_by: GroupKey,

    /// Output cap; values <= 0 mean "no cap"
    pub max_results: i64,
    /// Carried and round-tripped but never consumed by matching
    pub show_archived: bool,
}

impl Default for TodoFilter {
    fn default() -> Self {
        Self {
            due: DateRange::default(),
            created: DateRange::default(),
            updated: DateRange::default(),
            completed_between: DateRange::default(),
            title_contains: None,
            description_contains: None,
            exclude_text: None,
            priorities: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            completion: CompletionFilter::All,
            has_description: TriState::Any,
            has_due_date: TriState::Any,
            has_category: TriState::Any,
            overdue: TriState::Any,
            due_soon: TriState::Any,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            group_by: GroupKey::None,
            max_results: DEFAULT_MAX_RESULTS,
            show_archived: false,
        }
    }
}

/// Error returned when imported filter text cannot be parsed.
///
/// Structurally valid documents with odd values (e.g. a negative
/// `max_results`) parse fine and are passed through verbatim; only
/// malformed documents land here.
#[derive(Debug, Error)]
#[error("invalid filter text: {0}")]
pub struct InvalidFilterText(#[from] serde_json::Error);

/// Returns the effective needle of a text clause, or `None` when the
/// clause is blank and therefore a no-op.
pub(crate) fn active_text(clause: &Option<String>) -> Option<&str> {
    clause.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn format_day(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d").to_string()
}

fn describe_range(label: &str, range: &DateRange) -> Option<String> {
    match (range.start, range.end) {
        (None, None) => None,
        (Some(start), Some(end)) => Some(format!(
            "{label} between {} and {}",
            format_day(start),
            format_day(end)
        )),
        (Some(start), None) => Some(format!("{label} on or after {}", format_day(start))),
        (None, Some(end)) => Some(format!("{label} on or before {}", format_day(end))),
    }
}

fn describe_tristate(clause: TriState, yes: &str, no: &str) -> Option<String> {
    match clause {
        TriState::Any => None,
        TriState::Yes => Some(yes.to_string()),
        TriState::No => Some(no.to_string()),
    }
}

impl TodoFilter {
    /// One short description per active clause, in a fixed order: text
    /// clauses, multi-selects, completion status, date ranges, boolean
    /// clauses, then grouping. No-op clauses are skipped.
    pub fn summarize(&self) -> Vec<String> {
        let mut parts = Vec::new();

        if let Some(needle) = active_text(&self.title_contains) {
            parts.push(format!("Title contains \"{needle}\""));
        }
        if let Some(needle) = active_text(&self.description_contains) {
            parts.push(format!("Description contains \"{needle}\""));
        }
        if let Some(needle) = active_text(&self.exclude_text) {
            parts.push(format!("Excludes \"{needle}\""));
        }

        if !self.priorities.is_empty() {
            let names: Vec<&str> = self.priorities.iter().map(|p| p.label()).collect();
            parts.push(format!("Priority: {}", names.join(", ")));
        }
        if !self.categories.is_empty() {
            parts.push(format!("Category: {}", self.categories.join(", ")));
        }

        match self.completion {
            CompletionFilter::All => {}
            CompletionFilter::Completed => parts.push("Completed only".to_string()),
            CompletionFilter::Incomplete => parts.push("Active only".to_string()),
        }

        parts.extend(describe_range("Due", &self.due));
        parts.extend(describe_range("Created", &self.created));
        parts.extend(describe_range("Updated", &self.updated));
        parts.extend(describe_range("Completed", &self.completed_between));

        parts.extend(describe_tristate(
            self.has_description,
            "Has description",
            "No description",
        ));
        parts.extend(describe_tristate(self.has_due_date, "Has due date", "No due date"));
        parts.extend(describe_tristate(self.has_category, "Has category", "No category"));
        parts.extend(describe_tristate(self.overdue, "Overdue only", "Not overdue"));
        parts.extend(describe_tristate(self.due_soon, "Due soon only", "Not due soon"));

        if self.group_by != GroupKey::None {
            parts.push(format!("Grouped by {}", self.group_by.display_name()));
        }

        parts
    }

    /// Whether any clause is active or the result cap was changed.
    /// Kept in lockstep with the clause list `summarize` walks.
    pub fn is_active(&self) -> bool {
        !self.summarize().is_empty() || self.max_results != DEFAULT_MAX_RESULTS
    }

    /// Serialize to the exchange document: JSON with every timestamp as an
    /// absolute RFC 3339 string and absent bounds as explicit nulls.
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(self).expect("filter document serialization cannot fail")
    }

    /// Parse an exchange document produced by [`TodoFilter::to_text`].
    ///
    /// The document is trusted once it parses; semantic oddities are the
    /// caller's problem to clamp.
    pub fn from_text(text: &str) -> Result<Self, InvalidFilterText> {
        Ok(serde_json::from_str(text)?)
    }
}
