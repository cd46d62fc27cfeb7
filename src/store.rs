// Persistent todo store: JSONL journals with a SQLite cache
//
// The journals are the source of truth; SQLite is a rebuildable cache used
// for lookups and listing. `open` re-syncs the cache whenever a journal
// file is newer than its recorded sync time.

use crate::jsonl;
use crate::models::Todo;
use chrono::{DateTime, Utc};
use eyre::{Context, Result, eyre};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CURRENT_VERSION: u32 = 1;

const TODOS_COLLECTION: &str = "todos";
const PRESETS_COLLECTION: &str = "presets";

/// Store for todos and named filter presets
pub struct Store {
    base_path: PathBuf,
    db: Connection,
}

impl Store {
    /// Open or create a store at the given path
    ///
    /// The store lives in a `.checklist` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(".checklist");

        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join("checklist.db");
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut store = Self { base_path, db };

        store.create_schema()?;
        store.create_gitignore()?;
        store.write_version()?;

        if store.is_stale()? {
            info!("Database is stale, syncing from journals");
            store.sync()?;
        }

        Ok(store)
    }

    /// Get the base path of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id TEXT PRIMARY KEY,
                data_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_todos_updated_at ON todos(updated_at);

            -- Named filter presets: key -> serialized filter document
            CREATE TABLE IF NOT EXISTS presets (
                name TEXT PRIMARY KEY,
                filter_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Sync metadata for staleness detection
            CREATE TABLE IF NOT EXISTS sync_metadata (
                collection TEXT PRIMARY KEY,
                last_sync_time INTEGER NOT NULL,
                file_mtime INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    fn create_gitignore(&self) -> Result<()> {
        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(
                gitignore_path,
                "checklist.db\nchecklist.db-shm\nchecklist.db-wal\n",
            )?;
        }
        Ok(())
    }

    fn write_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
        }
        Ok(())
    }

    fn journal_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    /// Check if the cache needs syncing from the journals
    ///
    /// Returns true if any journal has been modified since the last sync,
    /// or has never been synced at all.
    pub fn is_stale(&self) -> Result<bool> {
        for collection in [TODOS_COLLECTION, PRESETS_COLLECTION] {
            let path = self.journal_path(collection);
            if !path.exists() {
                continue;
            }

            let file_mtime = journal_mtime(&path)?;

            let stored_mtime: Option<i64> = self
                .db
                .query_row(
                    "SELECT file_mtime FROM sync_metadata WHERE collection = ?1",
                    [collection],
                    |row| row.get(0),
                )
                .optional()?;

            match stored_mtime {
                None => return Ok(true),
                Some(mtime) if file_mtime > mtime => return Ok(true),
                _ => continue,
            }
        }

        Ok(false)
    }

    /// Rebuild the SQLite cache from the journal files
    pub fn sync(&mut self) -> Result<()> {
        info!("Syncing database from journals");

        self.db.execute("DELETE FROM todos", [])?;
        self.db.execute("DELETE FROM presets", [])?;

        let todos_path = self.journal_path(TODOS_COLLECTION);
        for record in jsonl::replay_latest(&todos_path, "id")?.into_values() {
            let data_json = serde_json::to_string(&record)?;
            let updated_at = record
                .get("updated_at")
                .and_then(serde_json::Value::as_str)
                .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                .map(|t| t.timestamp_millis())
                .unwrap_or(0);
            let id = record
                .get("id")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| eyre!("Journal record missing id"))?;

            self.db.execute(
                "INSERT OR REPLACE INTO todos (id, data_json, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, data_json, updated_at],
            )?;
        }
        self.record_sync(TODOS_COLLECTION, &todos_path)?;

        let presets_path = self.journal_path(PRESETS_COLLECTION);
        for record in jsonl::replay_latest(&presets_path, "name")?.into_values() {
            let name = record
                .get("name")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| eyre!("Preset record missing name"))?;
            let filter_json = record
                .get("filter")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| eyre!("Preset record missing filter"))?;
            let updated_at = record
                .get("updated_at")
                .and_then(serde_json::Value::as_str)
                .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                .map(|t| t.timestamp_millis())
                .unwrap_or(0);

            self.db.execute(
                "INSERT OR REPLACE INTO presets (name, filter_json, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, filter_json, updated_at],
            )?;
        }
        self.record_sync(PRESETS_COLLECTION, &presets_path)?;

        info!("Sync complete");
        Ok(())
    }

    fn record_sync(&self, collection: &str, path: &Path) -> Result<()> {
        let file_mtime = if path.exists() { journal_mtime(path)? } else { 0 };
        self.db.execute(
            "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![collection, Utc::now().timestamp_millis(), file_mtime],
        )?;
        Ok(())
    }

    // ========================================================================
    // Todos
    // ========================================================================

    /// Create a new todo
    pub fn create(&mut self, todo: &Todo) -> Result<String> {
        validate_id(&todo.id)?;
        if todo.title.trim().is_empty() {
            return Err(eyre!("Todo title cannot be empty"));
        }

        jsonl::append(&self.journal_path(TODOS_COLLECTION), todo)?;

        let data_json = serde_json::to_string(todo).context("Failed to serialize todo")?;
        self.db.execute(
            "INSERT OR REPLACE INTO todos (id, data_json, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![&todo.id, data_json, todo.updated_at.timestamp_millis()],
        )?;

        Ok(todo.id.clone())
    }

    /// Get a todo by id
    pub fn get(&self, id: &str) -> Result<Option<Todo>> {
        let mut stmt = self.db.prepare("SELECT data_json FROM todos WHERE id = ?1")?;

        let result = stmt
            .query_row([id], |row| row.get::<_, String>(0))
            .optional()?;

        match result {
            Some(json) => {
                let todo: Todo =
                    serde_json::from_str(&json).context("Failed to deserialize todo from database")?;
                Ok(Some(todo))
            }
            None => Ok(None),
        }
    }

    /// Update a todo (re-appends the full record)
    pub fn update(&mut self, todo: &Todo) -> Result<()> {
        self.create(todo)?;
        Ok(())
    }

    /// Delete a todo, leaving a tombstone in the journal
    pub fn delete(&mut self, id: &str) -> Result<()> {
        jsonl::append_tombstone(&self.journal_path(TODOS_COLLECTION), "id", id)?;
        self.db.execute("DELETE FROM todos WHERE id = ?1", [id])?;
        Ok(())
    }

    /// List the whole collection, most recently updated first
    pub fn list_all(&self) -> Result<Vec<Todo>> {
        let mut stmt = self
            .db
            .prepare("SELECT data_json FROM todos ORDER BY updated_at DESC, id ASC")?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut todos = Vec::new();
        for row in rows {
            let data_json = row?;
            let todo: Todo = serde_json::from_str(&data_json).context("Failed to deserialize todo")?;
            todos.push(todo);
        }
        Ok(todos)
    }

    // ========================================================================
    // Presets (name -> serialized filter text)
    // ========================================================================

    /// Save a named preset; overwrites any existing preset with that name
    pub fn save_preset(&mut self, name: &str, filter_text: &str) -> Result<()> {
        validate_preset_name(name)?;

        let record = serde_json::json!({
            "name": name,
            "filter": filter_text,
            "updated_at": Utc::now(),
        });
        jsonl::append(&self.journal_path(PRESETS_COLLECTION), &record)?;

        self.db.execute(
            "INSERT OR REPLACE INTO presets (name, filter_json, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, filter_text, Utc::now().timestamp_millis()],
        )?;

        Ok(())
    }

    /// Fetch the serialized filter text stored under a name
    pub fn load_preset(&self, name: &str) -> Result<Option<String>> {
        let mut stmt = self
            .db
            .prepare("SELECT filter_json FROM presets WHERE name = ?1")?;

        Ok(stmt.query_row([name], |row| row.get(0)).optional()?)
    }

    /// List preset names alphabetically
    pub fn list_presets(&self) -> Result<Vec<String>> {
        let mut stmt = self.db.prepare("SELECT name FROM presets ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Delete a named preset
    pub fn delete_preset(&mut self, name: &str) -> Result<()> {
        jsonl::append_tombstone(&self.journal_path(PRESETS_COLLECTION), "name", name)?;
        self.db.execute("DELETE FROM presets WHERE name = ?1", [name])?;
        Ok(())
    }
}

fn journal_mtime(path: &Path) -> Result<i64> {
    let metadata = fs::metadata(path)?;
    Ok(metadata
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(eyre!("Todo id cannot be empty or whitespace-only"));
    }
    if id.len() > 256 {
        return Err(eyre!("Todo id too long: {} chars (max 256)", id.len()));
    }
    Ok(())
}

fn validate_preset_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(eyre!("Preset name cannot be empty"));
    }
    if name.len() > 64 {
        return Err(eyre!("Preset name too long: {} (max 64 chars)", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TodoFilter;
    use crate::models::Priority;
    use tempfile::TempDir;

    fn sample(title: &str) -> Todo {
        Todo::new(title)
    }

    #[test]
    fn test_store_open_creates_directory() {
        let temp = TempDir::new().unwrap();

        let _store = Store::open(temp.path()).unwrap();
        let store_path = temp.path().join(".checklist");
        assert!(store_path.exists());
        assert!(store_path.join("checklist.db").exists());
        assert!(store_path.join(".gitignore").exists());
        assert!(store_path.join(".version").exists());
    }

    #[test]
    fn test_create_and_get() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let mut todo = sample("Water plants");
        todo.priority = Priority::High;
        todo.category = Some("Home".to_string());

        let id = store.create(&todo).unwrap();
        assert_eq!(id, todo.id);

        // Journal file was written
        assert!(temp.path().join(".checklist/todos.jsonl").exists());

        let retrieved = store.get(&todo.id).unwrap().unwrap();
        assert_eq!(retrieved, todo);
    }

    #[test]
    fn test_get_nonexistent() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let mut todo = sample("x");
        todo.title = "   ".to_string();
        assert!(store.create(&todo).is_err());
    }

    #[test]
    fn test_update() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let mut todo = sample("Original");
        store.create(&todo).unwrap();

        todo.title = "Updated".to_string();
        todo.completed = true;
        todo.touch();
        store.update(&todo).unwrap();

        let retrieved = store.get(&todo.id).unwrap().unwrap();
        assert_eq!(retrieved.title, "Updated");
        assert!(retrieved.completed);
    }

    #[test]
    fn test_delete_leaves_tombstone() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let todo = sample("Doomed");
        store.create(&todo).unwrap();
        store.delete(&todo.id).unwrap();

        assert!(store.get(&todo.id).unwrap().is_none());

        let journal = fs::read_to_string(temp.path().join(".checklist/todos.jsonl")).unwrap();
        assert!(journal.contains("\"deleted\":true"));
    }

    #[test]
    fn test_list_all() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        for title in ["one", "two", "three"] {
            store.create(&sample(title)).unwrap();
        }

        let todos = store.list_all().unwrap();
        assert_eq!(todos.len(), 3);
    }

    #[test]
    fn test_sync_rebuilds_from_journal() {
        let temp = TempDir::new().unwrap();
        let todo = sample("Survivor");
        {
            let mut store = Store::open(temp.path()).unwrap();
            store.create(&todo).unwrap();
            // Wipe the cache behind the store's back
            store.db.execute("DELETE FROM todos", []).unwrap();
            assert!(store.list_all().unwrap().is_empty());
            store.sync().unwrap();
            assert_eq!(store.list_all().unwrap().len(), 1);
        }

        // A fresh open also sees the journal contents
        let store = Store::open(temp.path()).unwrap();
        let retrieved = store.get(&todo.id).unwrap().unwrap();
        assert_eq!(retrieved.title, "Survivor");
    }

    #[test]
    fn test_preset_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let filter = TodoFilter {
            categories: vec!["Work".to_string()],
            ..TodoFilter::default()
        };
        store.save_preset("work", &filter.to_text()).unwrap();

        let text = store.load_preset("work").unwrap().unwrap();
        let loaded = TodoFilter::from_text(&text).unwrap();
        assert_eq!(loaded, filter);

        assert_eq!(store.list_presets().unwrap(), vec!["work"]);
    }

    #[test]
    fn test_preset_overwrite_and_delete() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        store.save_preset("mine", &TodoFilter::default().to_text()).unwrap();
        let replacement = TodoFilter {
            max_results: 5,
            ..TodoFilter::default()
        };
        store.save_preset("mine", &replacement.to_text()).unwrap();

        let text = store.load_preset("mine").unwrap().unwrap();
        assert_eq!(TodoFilter::from_text(&text).unwrap().max_results, 5);

        store.delete_preset("mine").unwrap();
        assert!(store.load_preset("mine").unwrap().is_none());
        assert!(store.list_presets().unwrap().is_empty());
    }

    #[test]
    fn test_preset_name_validation() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        assert!(store.save_preset("", "{}").is_err());
        assert!(store.save_preset("  ", "{}").is_err());
        assert!(store.save_preset(&"a".repeat(65), "{}").is_err());
    }
}
