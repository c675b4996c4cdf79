//! Tag administration: rename, merge, delete
//!
//! Validation lives here; the batch rewrites themselves run inside a single
//! transaction in the store, so a failure partway leaves every note
//! untouched.

use crate::db::Database;

/// Rename a tag across every note that carries it. Fails if any note
/// already carries the new name (use [`merge_tags`] for that). Renaming a
/// tag no note carries is a no-op returning 0.
///
/// Returns the number of notes updated.
pub fn rename_tag(db: &Database, old: &str, new: &str) -> Result<usize, String> {
    let old = old.trim();
    let new = new.trim();

    if old.is_empty() || new.is_empty() {
        return Err("Tag names cannot be empty".to_string());
    }
    if old == new {
        return Err("New tag name is the same as the old one".to_string());
    }
    // Collision is decided by the notes table; cache rows can go stale.
    let collisions = db
        .count_notes_with_tag(new)
        .map_err(|e| format!("Failed to rename tag: {}", e))?;
    if collisions > 0 {
        return Err(format!(
            "Tag '{}' already exists. Use merge to combine tags.",
            new
        ));
    }

    let updated = db
        .rename_tag(old, new)
        .map_err(|e| format!("Failed to rename tag: {}", e))?;

    println!("[TAGS] Renamed '{}' to '{}' ({} notes)", old, new, updated);
    Ok(updated)
}

/// Merge one or more source tags into a target tag. The target may be an
/// existing tag or a new name; sources are deduplicated and the target is
/// dropped from the source list if present.
///
/// Returns the number of notes whose tag list actually changed.
pub fn merge_tags(db: &Database, sources: &[String], target: &str) -> Result<usize, String> {
    let target = target.trim();
    if target.is_empty() {
        return Err("Target tag name cannot be empty".to_string());
    }

    let mut normalized: Vec<String> = Vec::new();
    for source in sources {
        let source = source.trim();
        if source.is_empty() || source == target {
            continue;
        }
        if !normalized.iter().any(|s| s == source) {
            normalized.push(source.to_string());
        }
    }
    if normalized.is_empty() {
        return Err("No source tags to merge".to_string());
    }

    let updated = db
        .merge_tags(&normalized, target)
        .map_err(|e| format!("Failed to merge tags: {}", e))?;

    println!(
        "[TAGS] Merged {:?} into '{}' ({} notes)",
        normalized, target, updated
    );
    Ok(updated)
}

/// Remove a tag from every note that carries it and drop its cache row.
///
/// Returns the number of notes updated.
pub fn delete_tag(db: &Database, name: &str) -> Result<usize, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Tag name cannot be empty".to_string());
    }

    let updated = db
        .remove_tag(name)
        .map_err(|e| format!("Failed to delete tag: {}", e))?;

    println!("[TAGS] Deleted '{}' ({} notes)", name, updated);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Note;

    fn note(url: &str, tags: &[&str]) -> Note {
        Note::new(
            url,
            url,
            None,
            Some("Misc".to_string()),
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        for n in [
            note("https://a.dev", &["rust", "async"]),
            note("https://b.dev", &["rust"]),
            note("https://c.dev", &["sqlite"]),
        ] {
            db.insert_note(&n).unwrap();
            db.upsert_tag_rows(&n.tags).unwrap();
        }
        db
    }

    #[test]
    fn test_rename_happy_path() {
        let db = seeded();
        let updated = rename_tag(&db, "rust", "rustlang").unwrap();
        assert_eq!(updated, 2);
        assert!(db.tag_row_exists("rustlang").unwrap());
        assert!(!db.tag_row_exists("rust").unwrap());
    }

    #[test]
    fn test_rename_rejects_collision() {
        let db = seeded();
        let err = rename_tag(&db, "rust", "sqlite").unwrap_err();
        assert!(err.contains("already exists"));
        // Nothing changed
        assert!(db.tag_row_exists("rust").unwrap());
    }

    #[test]
    fn test_rename_rejects_empty_and_same() {
        let db = seeded();
        assert!(rename_tag(&db, "", "x").is_err());
        assert!(rename_tag(&db, "rust", " ").is_err());
        assert!(rename_tag(&db, "rust", "rust").is_err());
    }

    #[test]
    fn test_rename_unknown_tag_is_noop() {
        let db = seeded();
        let updated = rename_tag(&db, "missing", "new").unwrap();
        assert_eq!(updated, 0);
        assert!(!db.tag_row_exists("new").unwrap());
    }

    #[test]
    fn test_rename_ignores_stale_cache_row() {
        let db = seeded();
        // A cache row with no referencing note must not block the rename
        db.upsert_tag_rows(&["ghost".to_string()]).unwrap();
        assert_eq!(db.count_notes_with_tag("ghost").unwrap(), 0);

        let updated = rename_tag(&db, "rust", "ghost").unwrap();
        assert_eq!(updated, 2);
        assert_eq!(db.count_notes_with_tag("ghost").unwrap(), 2);
        assert!(!db.tag_row_exists("rust").unwrap());
    }

    #[test]
    fn test_merge_counts_changed_notes_only() {
        let db = seeded();
        // "async" already coexists with "rust" on a.dev; merging async into
        // rust changes a.dev (drops async) but not b.dev or c.dev.
        let updated = merge_tags(&db, &["async".to_string()], "rust").unwrap();
        assert_eq!(updated, 1);
        assert!(!db.tag_row_exists("async").unwrap());
    }

    #[test]
    fn test_merge_drops_target_from_sources() {
        let db = seeded();
        let sources = vec!["rust".to_string(), "sqlite".to_string()];
        let updated = merge_tags(&db, &sources, "rust").unwrap();
        // Only the sqlite note changes
        assert_eq!(updated, 1);
        let n = db.get_note_by_url("https://c.dev").unwrap().unwrap();
        assert_eq!(n.tags, vec!["rust"]);
    }

    #[test]
    fn test_merge_with_no_effective_sources() {
        let db = seeded();
        let err = merge_tags(&db, &["rust".to_string()], "rust").unwrap_err();
        assert!(err.contains("No source tags"));
    }

    #[test]
    fn test_delete_tag() {
        let db = seeded();
        let updated = delete_tag(&db, "rust").unwrap();
        assert_eq!(updated, 2);
        assert!(!db.tag_row_exists("rust").unwrap());
        let n = db.get_note_by_url("https://a.dev").unwrap().unwrap();
        assert_eq!(n.tags, vec!["async"]);
    }
}
