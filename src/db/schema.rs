use rusqlite::{params, Connection, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::models::{tags_from_json, tags_to_json, CategoryCount, Note, TagCount};
use crate::app_state::{QueryState, SortBy, SortOrder};

pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn = Connection::open(&path)?;
        let db = Database { conn: Mutex::new(conn), path: path_str };
        db.init()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn: Mutex::new(conn), path: ":memory:".to_string() };
        db.init()?;
        Ok(db)
    }

    pub fn get_path(&self) -> String {
        self.path.clone()
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                description TEXT,
                category TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            );

            -- Cache of names in use. The notes table is authoritative;
            -- these rows are upserted on note mutations and pruned by cleanup.
            CREATE TABLE IF NOT EXISTS categories (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tags (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notes_category ON notes(category);
            CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at);
            ",
        )?;

        Ok(())
    }

    // ==================== Notes ====================

    pub fn insert_note(&self, note: &Note) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO notes (id, url, title, description, category, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                note.id,
                note.url,
                note.title,
                note.description,
                note.category,
                tags_to_json(&note.tags),
                note.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_note(&self, id: &str) -> Result<Option<Note>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, url, title, description, category, tags, created_at
             FROM notes WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], row_to_note)?;
        rows.next().transpose()
    }

    pub fn get_note_by_url(&self, url: &str) -> Result<Option<Note>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, url, title, description, category, tags, created_at
             FROM notes WHERE url = ?1",
        )?;
        let mut rows = stmt.query_map([url], row_to_note)?;
        rows.next().transpose()
    }

    /// List notes with the query's search / category / tag filters applied.
    ///
    /// Search matches title or description case-insensitively (full Unicode
    /// folding, applied after the SQL pass). Categories are OR semantics (any
    /// match). Tags are AND semantics (note must carry every selected tag)
    /// and are also filtered after the SQL pass since tags live in a JSON
    /// column.
    pub fn list_notes(&self, query: &QueryState) -> Result<Vec<Note>> {
        let mut sql = String::from(
            "SELECT id, url, title, description, category, tags, created_at FROM notes",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        let categories = query.selected_categories();
        if !categories.is_empty() {
            let placeholders: Vec<String> = categories
                .iter()
                .map(|c| {
                    args.push(c.clone());
                    format!("?{}", args.len())
                })
                .collect();
            clauses.push(format!("category IN ({})", placeholders.join(", ")));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(match (query.sort_by(), query.sort_order()) {
            (SortBy::CreatedAt, SortOrder::Desc) => " ORDER BY created_at DESC",
            (SortBy::CreatedAt, SortOrder::Asc) => " ORDER BY created_at ASC",
            (SortBy::Title, SortOrder::Desc) => " ORDER BY LOWER(title) DESC",
            (SortBy::Title, SortOrder::Asc) => " ORDER BY LOWER(title) ASC",
        });

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_note)?;

        // Search and tag filters run over the decoded rows: tags live in a
        // JSON column, and SQLite's LOWER() only folds ASCII.
        let search = query.search_query().trim().to_lowercase();
        let selected_tags = query.selected_tags();
        let mut notes = Vec::new();
        for row in rows {
            let note = row?;
            if !search.is_empty() {
                let in_title = note.title.to_lowercase().contains(&search);
                let in_description = note
                    .description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&search))
                    .unwrap_or(false);
                if !in_title && !in_description {
                    continue;
                }
            }
            if selected_tags
                .iter()
                .all(|t| note.tags.iter().any(|tag| tag == t))
            {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    /// Delete a note. Returns true if a row was removed.
    pub fn delete_note(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    pub fn update_note_category(&self, id: &str, category: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE notes SET category = ?1 WHERE id = ?2",
            params![category, id],
        )?;
        Ok(())
    }

    pub fn update_note_tags(&self, id: &str, tags: &[String]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE notes SET tags = ?1 WHERE id = ?2",
            params![tags_to_json(tags), id],
        )?;
        Ok(())
    }

    // ==================== Aggregates ====================

    /// Distinct categories in use, with note counts, most used first.
    pub fn category_counts(&self) -> Result<Vec<CategoryCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) AS uses FROM notes
             WHERE category IS NOT NULL
             GROUP BY category
             ORDER BY uses DESC, category ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CategoryCount { name: row.get(0)?, count: row.get(1)? })
        })?;
        rows.collect()
    }

    /// Distinct tags in use, with note counts, most used first.
    ///
    /// Computed by scanning every note's tag list and tallying, since tags
    /// are stored inline per note.
    pub fn tag_counts(&self) -> Result<Vec<TagCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT tags FROM notes")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut counts: HashMap<String, i64> = HashMap::new();
        for row in rows {
            for tag in tags_from_json(&row?) {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }

        let mut tallied: Vec<TagCount> = counts
            .into_iter()
            .map(|(name, count)| TagCount { name, count })
            .collect();
        tallied.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(tallied)
    }

    pub fn count_notes_with_category(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE category = ?1",
            [name],
            |row| row.get(0),
        )
    }

    pub fn count_notes_with_tag(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT tags FROM notes")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut count = 0;
        for row in rows {
            if tags_from_json(&row?).iter().any(|t| t == name) {
                count += 1;
            }
        }
        Ok(count)
    }

    // ==================== Category / tag cache rows ====================

    pub fn upsert_category_row(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO categories (name, created_at) VALUES (?1, ?2)",
            params![name, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    pub fn upsert_tag_rows(&self, tags: &[String]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        for tag in tags {
            conn.execute(
                "INSERT OR IGNORE INTO tags (name, created_at) VALUES (?1, ?2)",
                params![tag, now],
            )?;
        }
        Ok(())
    }

    pub fn delete_category_row(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM categories WHERE name = ?1", [name])?;
        Ok(())
    }

    pub fn delete_tag_row(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM tags WHERE name = ?1", [name])?;
        Ok(())
    }

    pub fn category_row_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn tag_row_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tags WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ==================== Tag batch rewrites ====================
    //
    // Each batch runs inside one transaction: either every affected note is
    // rewritten or none are. Cache rows are reconciled in the same transaction.

    /// Replace `old` with `new` in place in every note that carries it.
    /// Returns the number of notes rewritten. Collision checking is the
    /// caller's job.
    pub fn rename_tag(&self, old: &str, new: &str) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut updated = 0;

        {
            let notes = load_note_tags(&tx)?;
            for (id, mut tags) in notes {
                if !tags.iter().any(|t| t == old) {
                    continue;
                }
                for tag in tags.iter_mut() {
                    if tag == old {
                        *tag = new.to_string();
                    }
                }
                tx.execute(
                    "UPDATE notes SET tags = ?1 WHERE id = ?2",
                    params![tags_to_json(&tags), id],
                )?;
                updated += 1;
            }

            tx.execute("DELETE FROM tags WHERE name = ?1", [old])?;
            if updated > 0 {
                tx.execute(
                    "INSERT OR IGNORE INTO tags (name, created_at) VALUES (?1, ?2)",
                    params![new, chrono::Utc::now().timestamp_millis()],
                )?;
            }
        }

        tx.commit()?;
        Ok(updated)
    }

    /// Merge every source tag into `target`: remove all source entries and
    /// ensure `target` appears exactly once. Returns the number of notes whose
    /// tag list actually changed.
    pub fn merge_tags(&self, sources: &[String], target: &str) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut updated = 0;

        {
            let notes = load_note_tags(&tx)?;
            for (id, tags) in notes {
                if !tags.iter().any(|t| sources.iter().any(|s| s == t)) {
                    continue;
                }

                let mut merged: Vec<String> = tags
                    .iter()
                    .filter(|t| !sources.iter().any(|s| s == *t))
                    .cloned()
                    .collect();
                if !merged.iter().any(|t| t == target) {
                    merged.push(target.to_string());
                }

                if merged != tags {
                    tx.execute(
                        "UPDATE notes SET tags = ?1 WHERE id = ?2",
                        params![tags_to_json(&merged), id],
                    )?;
                    updated += 1;
                }
            }

            for source in sources {
                if source != target {
                    tx.execute("DELETE FROM tags WHERE name = ?1", [source.as_str()])?;
                }
            }
            if updated > 0 {
                tx.execute(
                    "INSERT OR IGNORE INTO tags (name, created_at) VALUES (?1, ?2)",
                    params![target, chrono::Utc::now().timestamp_millis()],
                )?;
            }
        }

        tx.commit()?;
        Ok(updated)
    }

    /// Remove `name` from every note that carries it (no replacement).
    /// Returns the number of notes rewritten.
    pub fn remove_tag(&self, name: &str) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut updated = 0;

        {
            let notes = load_note_tags(&tx)?;
            for (id, tags) in notes {
                if !tags.iter().any(|t| t == name) {
                    continue;
                }
                let remaining: Vec<String> =
                    tags.into_iter().filter(|t| t != name).collect();
                tx.execute(
                    "UPDATE notes SET tags = ?1 WHERE id = ?2",
                    params![tags_to_json(&remaining), id],
                )?;
                updated += 1;
            }

            tx.execute("DELETE FROM tags WHERE name = ?1", [name])?;
        }

        tx.commit()?;
        Ok(updated)
    }
}

fn row_to_note(row: &rusqlite::Row<'_>) -> Result<Note> {
    let tags_json: String = row.get(5)?;
    Ok(Note {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        tags: tags_from_json(&tags_json),
        created_at: row.get(6)?,
    })
}

fn load_note_tags(conn: &Connection) -> Result<Vec<(String, Vec<String>)>> {
    let mut stmt = conn.prepare("SELECT id, tags FROM notes")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut notes = Vec::new();
    for row in rows {
        let (id, tags_json) = row?;
        notes.push((id, tags_from_json(&tags_json)));
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(url: &str, title: &str, category: Option<&str>, tags: &[&str]) -> Note {
        Note::new(
            url,
            title,
            Some(format!("About {}", title)),
            category.map(String::from),
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        let mut a = note("https://a.dev", "Rust async book", Some("Rust"), &["rust", "async"]);
        let mut b = note("https://b.dev", "SQLite internals", Some("Databases"), &["sqlite"]);
        let mut c = note("https://c.dev", "Tokio tutorial", Some("Rust"), &["rust", "tokio"]);
        // Deterministic recency: c newest, a oldest
        a.created_at = 1000;
        b.created_at = 2000;
        c.created_at = 3000;
        for n in [&a, &b, &c] {
            db.insert_note(n).unwrap();
        }
        db
    }

    #[test]
    fn test_insert_and_get() {
        let db = Database::in_memory().unwrap();
        let n = note("https://example.com", "Example", Some("Misc"), &["demo"]);
        db.insert_note(&n).unwrap();

        let loaded = db.get_note(&n.id).unwrap().unwrap();
        assert_eq!(loaded, n);
        assert_eq!(
            db.get_note_by_url("https://example.com").unwrap().unwrap().id,
            n.id
        );
        assert!(db.get_note("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_url_rejected_by_constraint() {
        let db = Database::in_memory().unwrap();
        db.insert_note(&note("https://example.com", "First", None, &[])).unwrap();
        let err = db.insert_note(&note("https://example.com", "Second", None, &[]));
        assert!(err.is_err());
    }

    #[test]
    fn test_list_newest_first_by_default() {
        let db = seeded();
        let notes = db.list_notes(&QueryState::new()).unwrap();
        let urls: Vec<&str> = notes.iter().map(|n| n.url.as_str()).collect();
        assert_eq!(urls, vec!["https://c.dev", "https://b.dev", "https://a.dev"]);
    }

    #[test]
    fn test_list_search_case_insensitive() {
        let db = seeded();
        let mut state = QueryState::new();
        state.set_search_query("SQLITE");
        let notes = db.list_notes(&state).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "SQLite internals");

        // Matches description too
        state.set_search_query("about tokio");
        let notes = db.list_notes(&state).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Tokio tutorial");
    }

    #[test]
    fn test_list_search_folds_non_ascii_case() {
        let db = Database::in_memory().unwrap();
        db.insert_note(&note("https://e.dev", "École d'été", Some("Misc"), &[]))
            .unwrap();

        let mut state = QueryState::new();
        state.set_search_query("école");
        assert_eq!(db.list_notes(&state).unwrap().len(), 1);

        state.set_search_query("ÉTÉ");
        assert_eq!(db.list_notes(&state).unwrap().len(), 1);
    }

    #[test]
    fn test_list_category_filter_is_or() {
        let db = seeded();
        let mut state = QueryState::new();
        state.set_selected_categories(vec!["Rust".to_string(), "Databases".to_string()]);
        assert_eq!(db.list_notes(&state).unwrap().len(), 3);

        state.set_selected_categories(vec!["Databases".to_string()]);
        let notes = db.list_notes(&state).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "SQLite internals");
    }

    #[test]
    fn test_list_tag_filter_is_and() {
        let db = seeded();
        let mut state = QueryState::new();
        state.set_selected_tags(vec!["rust".to_string()]);
        assert_eq!(db.list_notes(&state).unwrap().len(), 2);

        state.set_selected_tags(vec!["rust".to_string(), "tokio".to_string()]);
        let notes = db.list_notes(&state).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Tokio tutorial");
    }

    #[test]
    fn test_list_sorted_by_title() {
        let db = seeded();
        let mut state = QueryState::new();
        state.set_sort(SortBy::Title, SortOrder::Asc);
        let notes = db.list_notes(&state).unwrap();
        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust async book", "SQLite internals", "Tokio tutorial"]);
    }

    #[test]
    fn test_category_counts_descending() {
        let db = seeded();
        let counts = db.category_counts().unwrap();
        assert_eq!(counts[0].name, "Rust");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].name, "Databases");
        assert_eq!(counts[1].count, 1);
    }

    #[test]
    fn test_tag_counts_descending() {
        let db = seeded();
        let counts = db.tag_counts().unwrap();
        assert_eq!(counts[0].name, "rust");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts.len(), 4);
    }

    #[test]
    fn test_count_notes_with_tag() {
        let db = seeded();
        assert_eq!(db.count_notes_with_tag("rust").unwrap(), 2);
        assert_eq!(db.count_notes_with_tag("tokio").unwrap(), 1);
        assert_eq!(db.count_notes_with_tag("nope").unwrap(), 0);
    }

    #[test]
    fn test_rename_tag_in_place() {
        let db = seeded();
        db.upsert_tag_rows(&["rust".to_string()]).unwrap();
        let updated = db.rename_tag("rust", "rustlang").unwrap();
        assert_eq!(updated, 2);

        // Position preserved: "rustlang" replaces "rust" where it was
        let a = db.get_note_by_url("https://a.dev").unwrap().unwrap();
        assert_eq!(a.tags, vec!["rustlang", "async"]);
        assert_eq!(db.count_notes_with_tag("rust").unwrap(), 0);
        assert!(!db.tag_row_exists("rust").unwrap());
        assert!(db.tag_row_exists("rustlang").unwrap());
    }

    #[test]
    fn test_merge_tags_counts_changed_notes_only() {
        let db = Database::in_memory().unwrap();
        db.insert_note(&note("https://1.dev", "One", None, &["a"])).unwrap();
        db.insert_note(&note("https://2.dev", "Two", None, &["b"])).unwrap();
        db.insert_note(&note("https://3.dev", "Three", None, &["a", "b", "target"])).unwrap();
        db.insert_note(&note("https://4.dev", "Four", None, &["unrelated"])).unwrap();

        let sources = vec!["a".to_string(), "b".to_string()];
        let updated = db.merge_tags(&sources, "target").unwrap();
        assert_eq!(updated, 3);

        for url in ["https://1.dev", "https://2.dev", "https://3.dev"] {
            let n = db.get_note_by_url(url).unwrap().unwrap();
            assert_eq!(n.tags, vec!["target"]);
        }
        let untouched = db.get_note_by_url("https://4.dev").unwrap().unwrap();
        assert_eq!(untouched.tags, vec!["unrelated"]);
    }

    #[test]
    fn test_merge_with_unmatched_sources_leaves_no_cache_row() {
        let db = seeded();
        let updated = db.merge_tags(&["nope".to_string()], "brand-new").unwrap();
        assert_eq!(updated, 0);
        // No note carries the target, so no cache row may appear
        assert!(!db.tag_row_exists("brand-new").unwrap());
        assert_eq!(db.count_notes_with_tag("brand-new").unwrap(), 0);
    }

    #[test]
    fn test_remove_tag() {
        let db = seeded();
        db.upsert_tag_rows(&["rust".to_string()]).unwrap();
        let updated = db.remove_tag("rust").unwrap();
        assert_eq!(updated, 2);

        let a = db.get_note_by_url("https://a.dev").unwrap().unwrap();
        assert_eq!(a.tags, vec!["async"]);
        assert_eq!(db.count_notes_with_tag("rust").unwrap(), 0);
        assert!(!db.tag_row_exists("rust").unwrap());
    }

    #[test]
    fn test_delete_note() {
        let db = seeded();
        let n = db.get_note_by_url("https://a.dev").unwrap().unwrap();
        assert!(db.delete_note(&n.id).unwrap());
        assert!(db.get_note(&n.id).unwrap().is_none());
        assert!(!db.delete_note(&n.id).unwrap());
    }
}
