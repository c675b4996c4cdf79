//! Linkstash CLI - command-line interface for the bookmark library
//!
//! Usage: linkstash [OPTIONS] <COMMAND>
//!
//! Supports JSON output for scripting.

use clap::{Parser, Subcommand};
use linkstash_lib::{
    actions,
    app_state::{QueryState, SortBy, SortOrder},
    db::Database,
    settings, tags,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "linkstash")]
#[command(version, about = "AI-assisted bookmark manager CLI", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database path (default: auto-detect)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a URL: fetch its content, classify it, store it
    Add {
        url: String,
    },
    /// List notes with optional search, filters, and sorting
    List {
        /// Case-insensitive search over title and description
        #[arg(long, short)]
        search: Option<String>,
        /// Filter by category (repeatable; categories are ORed)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Filter by tag (repeatable; tags are ANDed)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Sort field: date (default) or title
        #[arg(long, default_value = "date")]
        sort: String,
        /// Sort order: asc or desc (default)
        #[arg(long, default_value = "desc")]
        order: String,
    },
    /// Show one note by id
    Show {
        id: String,
    },
    /// Delete a note by id
    Delete {
        id: String,
    },
    /// List categories with note counts
    Categories,
    /// List tags with note counts
    Tags,
    /// Tag administration
    Tag {
        #[command(subcommand)]
        cmd: TagCommands,
    },
    /// Set or clear a note's category
    SetCategory {
        id: String,
        /// New category; omit to clear
        category: Option<String>,
    },
    /// Replace a note's tags
    SetTags {
        id: String,
        /// New tag list (repeatable); omit all to clear
        tags: Vec<String>,
    },
    /// Configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Rename a tag everywhere (fails if the new name already exists)
    Rename {
        old: String,
        new: String,
    },
    /// Merge one or more tags into a target tag
    Merge {
        /// Source tags to merge away (repeatable)
        sources: Vec<String>,
        /// Tag to merge into
        #[arg(long)]
        into: String,
    },
    /// Remove a tag from every note
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration (keys are masked)
    List,
    /// Get a config value
    Get {
        key: String,
    },
    /// Set a config value
    Set {
        key: String,
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    let Cli { db, json, command } = cli;

    // Initialize settings first (needed for custom db path)
    let app_data_dir = dirs::data_dir()
        .map(|p| p.join("linkstash"))
        .unwrap_or_else(|| PathBuf::from("."));
    settings::init(app_data_dir);

    // Config commands need no database
    let command = match command {
        Commands::Config { cmd } => return handle_config(cmd, json),
        other => other,
    };

    let db_path = db.map(PathBuf::from).unwrap_or_else(find_database);
    let db = Arc::new(
        Database::new(&db_path).map_err(|e| format!("Failed to open database: {}", e))?,
    );

    match command {
        Commands::Add { url } => handle_add(&url, &db, json).await,
        Commands::List {
            search,
            categories,
            tags,
            sort,
            order,
        } => handle_list(search, categories, tags, &sort, &order, &db, json),
        Commands::Show { id } => handle_show(&id, &db, json),
        Commands::Delete { id } => handle_delete(&id, &db, json),
        Commands::Categories => handle_categories(&db, json),
        Commands::Tags => handle_tags(&db, json),
        Commands::Tag { cmd } => handle_tag(cmd, &db, json),
        Commands::SetCategory { id, category } => {
            let note = actions::update_category(&db, &id, category)?;
            print_note(&note, json);
            Ok(())
        }
        Commands::SetTags { id, tags } => {
            let note = actions::update_tags(&db, &id, tags)?;
            print_note(&note, json);
            Ok(())
        }
        Commands::Config { .. } => unreachable!(),
    }
}

/// Resolve the database path: custom path from settings, then the
/// LINKSTASH_DB env var, then the platform data directory.
fn find_database() -> PathBuf {
    if let Some(custom) = settings::get_custom_db_path() {
        return PathBuf::from(custom);
    }
    if let Ok(path) = std::env::var("LINKSTASH_DB") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::data_dir()
        .map(|p| p.join("linkstash").join("linkstash.db"))
        .unwrap_or_else(|| PathBuf::from("linkstash.db"))
}

async fn handle_add(url: &str, db: &Database, json: bool) -> Result<(), String> {
    let note = actions::save_url(db, url).await?;
    if json {
        println!("{}", serde_json::to_string(&note).unwrap_or_default());
    } else {
        println!("Saved: {}", note.title);
        println!("  id:       {}", note.id);
        println!("  category: {}", note.category.as_deref().unwrap_or("-"));
        println!("  tags:     {}", format_tags(&note.tags));
        if let Some(summary) = &note.description {
            println!("  summary:  {}", summary);
        }
    }
    Ok(())
}

fn handle_list(
    search: Option<String>,
    categories: Vec<String>,
    tag_filters: Vec<String>,
    sort: &str,
    order: &str,
    db: &Database,
    json: bool,
) -> Result<(), String> {
    let sort_by = SortBy::from_str(sort).ok_or_else(|| format!("Unknown sort field: {}", sort))?;
    let sort_order =
        SortOrder::from_str(order).ok_or_else(|| format!("Unknown sort order: {}", order))?;

    let mut query = QueryState::new();
    if let Some(s) = search {
        query.set_search_query(s);
    }
    query.set_selected_categories(categories);
    query.set_selected_tags(tag_filters);
    query.set_sort(sort_by, sort_order);

    let notes = actions::get_notes(db, &query)?;
    if json {
        println!("{}", serde_json::to_string(&notes).unwrap_or_default());
    } else if notes.is_empty() {
        println!("No notes found");
    } else {
        for note in &notes {
            println!(
                "{}  [{}] {} {}",
                note.id,
                note.category.as_deref().unwrap_or("-"),
                note.title,
                format_tags(&note.tags)
            );
        }
        println!("\n{} note(s)", notes.len());
    }
    Ok(())
}

fn handle_show(id: &str, db: &Database, json: bool) -> Result<(), String> {
    let note = actions::get_note(db, id)?;
    print_note(&note, json);
    Ok(())
}

fn handle_delete(id: &str, db: &Database, json: bool) -> Result<(), String> {
    actions::delete_note(db, id)?;
    if json {
        println!(r#"{{"status":"ok"}}"#);
    } else {
        println!("Deleted note {}", id);
    }
    Ok(())
}

fn handle_categories(db: &Database, json: bool) -> Result<(), String> {
    let categories = actions::get_categories(db)?;
    if json {
        println!("{}", serde_json::to_string(&categories).unwrap_or_default());
    } else if categories.is_empty() {
        println!("No categories yet");
    } else {
        for c in &categories {
            println!("{:5}  {}", c.count, c.name);
        }
    }
    Ok(())
}

fn handle_tags(db: &Database, json: bool) -> Result<(), String> {
    let tag_counts = actions::get_tags(db)?;
    if json {
        println!("{}", serde_json::to_string(&tag_counts).unwrap_or_default());
    } else if tag_counts.is_empty() {
        println!("No tags yet");
    } else {
        for t in &tag_counts {
            println!("{:5}  {}", t.count, t.name);
        }
    }
    Ok(())
}

fn handle_tag(cmd: TagCommands, db: &Database, json: bool) -> Result<(), String> {
    let updated = match cmd {
        TagCommands::Rename { old, new } => tags::rename_tag(db, &old, &new)?,
        TagCommands::Merge { sources, into } => tags::merge_tags(db, &sources, &into)?,
        TagCommands::Delete { name } => tags::delete_tag(db, &name)?,
    };
    if json {
        println!(r#"{{"updated":{}}}"#, updated);
    } else {
        println!("{} note(s) updated", updated);
    }
    Ok(())
}

fn handle_config(cmd: ConfigCommands, json: bool) -> Result<(), String> {
    match cmd {
        ConfigCommands::List => {
            let extraction_url = settings::get_extraction_base_url();
            let extraction_key = settings::get_masked_extraction_api_key();
            let classifier_url = settings::get_classifier_base_url();
            let classifier_key = settings::get_masked_classifier_api_key();
            let model = settings::get_classifier_model();
            let db_path = settings::get_custom_db_path();

            if json {
                println!(
                    r#"{{"extraction_base_url":"{}","extraction_api_key":{},"classifier_base_url":"{}","classifier_api_key":{},"classifier_model":"{}","db_path":{}}}"#,
                    extraction_url,
                    extraction_key
                        .as_ref()
                        .map(|k| format!("\"{}\"", k))
                        .unwrap_or("null".to_string()),
                    classifier_url,
                    classifier_key
                        .as_ref()
                        .map(|k| format!("\"{}\"", k))
                        .unwrap_or("null".to_string()),
                    model,
                    db_path
                        .as_ref()
                        .map(|p| format!("\"{}\"", p))
                        .unwrap_or("null".to_string())
                );
            } else {
                println!("extraction-url:  {}", extraction_url);
                println!(
                    "extraction-key:  {}",
                    extraction_key.as_deref().unwrap_or("not set")
                );
                println!("classifier-url:  {}", classifier_url);
                println!(
                    "classifier-key:  {}",
                    classifier_key.as_deref().unwrap_or("not set")
                );
                println!("model:           {}", model);
                println!("db-path:         {}", db_path.as_deref().unwrap_or("default"));
            }
        }
        ConfigCommands::Get { key } => {
            let value: String = match key.as_str() {
                "extraction-url" => settings::get_extraction_base_url(),
                "extraction-key" => settings::get_masked_extraction_api_key()
                    .unwrap_or_else(|| "not set".to_string()),
                "classifier-url" => settings::get_classifier_base_url(),
                "classifier-key" => settings::get_masked_classifier_api_key()
                    .unwrap_or_else(|| "not set".to_string()),
                "model" => settings::get_classifier_model(),
                "db-path" => {
                    settings::get_custom_db_path().unwrap_or_else(|| "default".to_string())
                }
                _ => return Err(format!("Unknown config key: {}", key)),
            };

            if json {
                println!(r#"{{"{}":"{}"}}"#, key, value);
            } else {
                println!("{}", value);
            }
        }
        ConfigCommands::Set { key, value } => {
            match key.as_str() {
                "extraction-url" => settings::set_extraction_base_url(Some(value.clone()))?,
                "extraction-key" => settings::set_extraction_api_key(value.clone())?,
                "classifier-url" => settings::set_classifier_base_url(Some(value.clone()))?,
                "classifier-key" => settings::set_classifier_api_key(value.clone())?,
                "model" => settings::set_classifier_model(value.clone())?,
                "db-path" => settings::set_custom_db_path(Some(value.clone()))?,
                _ => return Err(format!("Unknown config key: {}", key)),
            }

            if json {
                println!(r#"{{"status":"ok"}}"#);
            } else {
                println!("Set {}", key);
            }
        }
    }
    Ok(())
}

fn print_note(note: &linkstash_lib::db::Note, json: bool) {
    if json {
        println!("{}", serde_json::to_string(note).unwrap_or_default());
    } else {
        println!("{}", note.title);
        println!("  id:       {}", note.id);
        println!("  url:      {}", note.url);
        println!("  category: {}", note.category.as_deref().unwrap_or("-"));
        println!("  tags:     {}", format_tags(&note.tags));
        if let Some(summary) = &note.description {
            println!("  summary:  {}", summary);
        }
    }
}

fn format_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        "-".to_string()
    } else {
        tags.join(", ")
    }
}
