// Checklist - todo list management with a filter/sort/group engine

pub mod engine;
pub mod filter;
pub mod jsonl;
pub mod models;
pub mod store;

// Re-export main types for convenience
pub use engine::{apply, group, matches};
pub use filter::{
    CompletionFilter, DateRange, GroupKey, InvalidFilterText, SortKey, SortOrder, TodoFilter,
    TriState, DEFAULT_MAX_RESULTS,
};
pub use models::{Priority, Todo};
pub use store::Store;
