//! Public operations over the note store
//!
//! Each function here is one user action: save a URL, browse, delete,
//! retag. Errors cross this boundary as flat user-readable strings.

use url::Url;

use crate::classifier;
use crate::db::{CategoryCount, Database, Note, TagCount};
use crate::fetcher;
use crate::app_state::QueryState;

/// Save a URL: validate, reject duplicates, fetch content, classify, persist.
///
/// The duplicate check runs before any network call, and the store write is
/// the last step, so a failed fetch never leaves a partial note behind.
/// Classification cannot fail (it degrades to fallback values).
pub async fn save_url(db: &Database, url: &str) -> Result<Note, String> {
    let url = url.trim();
    Url::parse(url).map_err(|_| format!("Invalid URL: {}", url))?;

    if db
        .get_note_by_url(url)
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("This URL is already saved".to_string());
    }

    let page = fetcher::fetch_content(url).await?;

    let categories: Vec<String> = db
        .category_counts()
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|c| c.name)
        .collect();
    let existing_tags: Vec<String> = db
        .tag_counts()
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let analysis = classifier::analyze(&page.title, &page.markdown, &categories, &existing_tags).await;

    let note = Note::new(
        url,
        &page.title,
        Some(analysis.summary),
        Some(analysis.category),
        analysis.tags,
    );
    db.insert_note(&note)
        .map_err(|e| format!("Failed to save note: {}", e))?;
    remember_names(db, note.category.as_deref(), &note.tags);

    println!("[SAVE] Saved {} ({})", note.url, note.title);
    Ok(note)
}

/// List notes with the given search/filter/sort state applied.
pub fn get_notes(db: &Database, query: &QueryState) -> Result<Vec<Note>, String> {
    db.list_notes(query)
        .map_err(|e| format!("Failed to load notes: {}", e))
}

pub fn get_note(db: &Database, id: &str) -> Result<Note, String> {
    db.get_note(id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Note not found: {}", id))
}

/// Delete a note, then prune its former category/tags if nothing else
/// references them. Cleanup is best-effort: the deletion already succeeded,
/// so cleanup failures are logged and swallowed.
pub fn delete_note(db: &Database, id: &str) -> Result<(), String> {
    let note = get_note(db, id)?;
    db.delete_note(id)
        .map_err(|e| format!("Failed to delete note: {}", e))?;

    cleanup_orphans(db, note.category.as_deref(), &note.tags);
    Ok(())
}

pub fn get_categories(db: &Database) -> Result<Vec<CategoryCount>, String> {
    db.category_counts()
        .map_err(|e| format!("Failed to load categories: {}", e))
}

pub fn get_tags(db: &Database) -> Result<Vec<TagCount>, String> {
    db.tag_counts()
        .map_err(|e| format!("Failed to load tags: {}", e))
}

/// Set or clear a note's category, keeping the name cache consistent.
pub fn update_category(
    db: &Database,
    id: &str,
    category: Option<String>,
) -> Result<Note, String> {
    let note = get_note(db, id)?;
    let new_category = category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    db.update_note_category(id, new_category.as_deref())
        .map_err(|e| format!("Failed to update category: {}", e))?;

    if let Some(name) = &new_category {
        if let Err(e) = db.upsert_category_row(name) {
            eprintln!("[CLEANUP] Failed to record category '{}': {}", name, e);
        }
    }
    if let Some(old) = note.category.as_deref() {
        if new_category.as_deref() != Some(old) {
            cleanup_orphans(db, Some(old), &[]);
        }
    }

    get_note(db, id)
}

/// Replace a note's tag list, keeping the name cache consistent.
/// Tags are trimmed, empties dropped, and duplicates removed in order.
pub fn update_tags(db: &Database, id: &str, tags: Vec<String>) -> Result<Note, String> {
    let note = get_note(db, id)?;
    let new_tags = normalize_tags(tags);

    db.update_note_tags(id, &new_tags)
        .map_err(|e| format!("Failed to update tags: {}", e))?;

    if let Err(e) = db.upsert_tag_rows(&new_tags) {
        eprintln!("[CLEANUP] Failed to record tags: {}", e);
    }
    let removed: Vec<String> = note
        .tags
        .into_iter()
        .filter(|t| !new_tags.contains(t))
        .collect();
    cleanup_orphans(db, None, &removed);

    get_note(db, id)
}

/// Record a note's category/tag names in the cache tables (best-effort).
fn remember_names(db: &Database, category: Option<&str>, tags: &[String]) {
    if let Some(name) = category {
        if let Err(e) = db.upsert_category_row(name) {
            eprintln!("[CLEANUP] Failed to record category '{}': {}", name, e);
        }
    }
    if let Err(e) = db.upsert_tag_rows(tags) {
        eprintln!("[CLEANUP] Failed to record tags: {}", e);
    }
}

/// Remove cache rows for a category and tags that no note references
/// anymore. Never fails; problems are logged and the remaining names are
/// still checked.
pub(crate) fn cleanup_orphans(db: &Database, category: Option<&str>, tags: &[String]) {
    if let Some(name) = category {
        match db.count_notes_with_category(name) {
            Ok(0) => {
                if let Err(e) = db.delete_category_row(name) {
                    eprintln!("[CLEANUP] Failed to remove category '{}': {}", name, e);
                } else {
                    println!("[CLEANUP] Removed orphaned category: {}", name);
                }
            }
            Ok(_) => {}
            Err(e) => eprintln!("[CLEANUP] Failed to count category '{}': {}", name, e),
        }
    }

    for tag in tags {
        match db.count_notes_with_tag(tag) {
            Ok(0) => {
                if let Err(e) = db.delete_tag_row(tag) {
                    eprintln!("[CLEANUP] Failed to remove tag '{}': {}", tag, e);
                } else {
                    println!("[CLEANUP] Removed orphaned tag: {}", tag);
                }
            }
            Ok(_) => {}
            Err(e) => eprintln!("[CLEANUP] Failed to count tag '{}': {}", tag, e),
        }
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}
