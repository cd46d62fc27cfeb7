// Pure filtering, sorting, and grouping over todo collections
//
// Every function here is a pure function of (todos, filter, now): callers
// pass the current instant explicitly so time-dependent clauses (overdue,
// due soon, due-date buckets) stay deterministic and testable.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::filter::{active_text, CompletionFilter, GroupKey, SortKey, SortOrder, TodoFilter};
use crate::models::Todo;

const MS_PER_DAY: i64 = 86_400_000;

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Returns `true` if the todo passes every clause of the filter.
///
/// Clauses are independent per-task predicates; a todo lacking an optional
/// field fails any bounded clause that depends on it (e.g. no due date
/// against a due range) rather than raising.
pub fn matches(todo: &Todo, filter: &TodoFilter, now: DateTime<Utc>) -> bool {
    if !filter.due.is_unbounded() {
        match todo.due_date {
            Some(due) if filter.due.contains(due) => {}
            _ => return false,
        }
    }
    if !filter.created.contains(todo.created_at) {
        return false;
    }
    if !filter.updated.contains(todo.updated_at) {
        return false;
    }
    // Completion instant is approximated by updated_at; incomplete todos
    // fail this clause whenever it is bounded.
    if !filter.completed_between.is_unbounded()
        && !(todo.completed && filter.completed_between.contains(todo.updated_at))
    {
        return false;
    }

    if let Some(needle) = active_text(&filter.title_contains) {
        if !contains_ci(&todo.title, needle) {
            return false;
        }
    }
    if let Some(needle) = active_text(&filter.description_contains) {
        match todo.description.as_deref() {
            Some(description) if contains_ci(description, needle) => {}
            _ => return false,
        }
    }
    if let Some(needle) = active_text(&filter.exclude_text) {
        if contains_ci(&todo.title, needle) {
            return false;
        }
        if todo
            .description
            .as_deref()
            .is_some_and(|d| contains_ci(d, needle))
        {
            return false;
        }
    }

    if !filter.priorities.is_empty() && !filter.priorities.contains(&todo.priority) {
        return false;
    }
    if !filter.categories.is_empty() {
        match todo.category.as_deref() {
            Some(category) if filter.categories.iter().any(|c| c == category) => {}
            _ => return false,
        }
    }

    match filter.completion {
        CompletionFilter::All => {}
        CompletionFilter::Completed if !todo.completed => return false,
        CompletionFilter::Incomplete if todo.completed => return false,
        _ => {}
    }

    filter.has_description.accepts(todo.has_description())
        && filter.has_due_date.accepts(todo.due_date.is_some())
        && filter.has_category.accepts(todo.has_category())
        && filter.overdue.accepts(todo.is_overdue(now))
        && filter.due_soon.accepts(todo.is_due_soon(now))
}

/// Filter, sort, and cap a todo collection.
///
/// Sorting is stable: todos with equal keys keep their input order, under
/// either direction. A `max_results` of zero or less means no cap.
pub fn apply(todos: &[Todo], filter: &TodoFilter, now: DateTime<Utc>) -> Vec<Todo> {
    let mut result: Vec<Todo> = todos
        .iter()
        .filter(|todo| matches(todo, filter, now))
        .cloned()
        .collect();

    result.sort_by(|a, b| compare(a, b, filter.sort_by, filter.sort_order));

    if filter.max_results > 0 {
        result.truncate(filter.max_results as usize);
    }
    result
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        // Reversing Equal keeps it Equal, so ties stay in input order
        SortOrder::Desc => ordering.reverse(),
    }
}

fn compare(a: &Todo, b: &Todo, key: SortKey, order: SortOrder) -> Ordering {
    match key {
        SortKey::Created => directed(a.created_at.cmp(&b.created_at), order),
        SortKey::Updated => directed(a.updated_at.cmp(&b.updated_at), order),
        SortKey::Title => directed(
            a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            order,
        ),
        SortKey::Priority => directed(a.priority.rank().cmp(&b.priority.rank()), order),
        SortKey::Category => {
            let left = a.category.as_deref().unwrap_or("");
            let right = b.category.as_deref().unwrap_or("");
            directed(left.cmp(right), order)
        }
        // A missing due date sorts after any present one, in both
        // directions; the direction flag only orders present dates.
        SortKey::DueDate => match (a.due_date, b.due_date) {
            (Some(left), Some(right)) => directed(left.cmp(&right), order),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Partition an already-filtered, already-sorted sequence by a group key.
///
/// Groups appear in first-seen order and each keeps its todos in input
/// order; the union of all groups is exactly the input.
pub fn group(todos: &[Todo], key: GroupKey, now: DateTime<Utc>) -> Vec<(String, Vec<Todo>)> {
    let mut groups: Vec<(String, Vec<Todo>)> = Vec::new();
    for todo in todos {
        let label = group_label(todo, key, now);
        match groups.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, bucket)) => bucket.push(todo.clone()),
            None => groups.push((label, vec![todo.clone()])),
        }
    }
    groups
}

fn group_label(todo: &Todo, key: GroupKey, now: DateTime<Utc>) -> String {
    match key {
        GroupKey::None => "All Todos".to_string(),
        GroupKey::Category => match todo.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => category.to_string(),
            _ => "Uncategorized".to_string(),
        },
        GroupKey::Priority => format!("{} Priority", todo.priority.label()),
        GroupKey::Status => if todo.completed { "Completed" } else { "Active" }.to_string(),
        GroupKey::DueDate => due_bucket(todo.due_date, now).to_string(),
    }
}

/// Ceiling-day difference between the due date and now decides the bucket:
/// negative is overdue regardless of magnitude, 0 is today, 1 tomorrow,
/// up to 7 this week, up to 30 this month, anything later "Due Later".
fn due_bucket(due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> &'static str {
    let Some(due) = due_date else {
        return "No Due Date";
    };
    let ms = (due - now).num_milliseconds();
    let days = ms.div_euclid(MS_PER_DAY) + i64::from(ms.rem_euclid(MS_PER_DAY) > 0);
    match days {
        d if d < 0 => "Overdue",
        0 => "Due Today",
        1 => "Due Tomorrow",
        2..=7 => "Due This Week",
        8..=30 => "Due This Month",
        _ => "Due Later",
    }
}
