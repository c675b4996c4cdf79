//! End-to-end save pipeline against a mock extraction service.
//!
//! Settings are process-global, so everything that touches them runs inside
//! one sequential test.

use linkstash_lib::{actions, app_state::QueryState, db::Database, settings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Serve extraction responses on a local port. Returns the base URL and a
/// counter of requests received.
fn start_mock_extractor() -> (String, Arc<AtomicUsize>) {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let thread_hits = hits.clone();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            thread_hits.fetch_add(1, Ordering::SeqCst);

            if request.url().contains("broken.example") {
                let response = tiny_http::Response::from_string("upstream failure")
                    .with_status_code(500);
                let _ = request.respond(response);
                continue;
            }

            let body = r##"{
                "code": 200,
                "status": 20000,
                "data": {
                    "title": "Example Domain",
                    "description": "An illustrative example page",
                    "content": "# Example Domain\n\nThis domain is for use in illustrative examples in documents.",
                    "markdown": null
                }
            }"##;
            let response = tiny_http::Response::from_string(body).with_header(
                tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .unwrap(),
            );
            let _ = request.respond(response);
        }
    });

    (format!("http://{}", addr), hits)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_save_pipeline_end_to_end() {
    // Keep ambient keys from leaking in: with no classifier key the save
    // pipeline must fall back to default classification values.
    std::env::remove_var("GROQ_API_KEY");
    std::env::remove_var("JINA_API_KEY");

    let config_dir = tempfile::tempdir().unwrap();
    settings::init(config_dir.path().to_path_buf());

    let (mock_url, hits) = start_mock_extractor();
    settings::set_extraction_base_url(Some(mock_url)).unwrap();

    let db = Database::in_memory().unwrap();

    // Happy path: fetch succeeds, classifier falls back
    let note = actions::save_url(&db, "https://example.com/article")
        .await
        .unwrap();
    assert_eq!(note.url, "https://example.com/article");
    assert_eq!(note.title, "Example Domain");
    assert_eq!(note.category.as_deref(), Some("Uncategorized"));
    assert!(note.tags.is_empty());
    // Fallback summary is the page title
    assert_eq!(note.description.as_deref(), Some("Example Domain"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let notes = actions::get_notes(&db, &QueryState::new()).unwrap();
    assert_eq!(notes.len(), 1);

    // The stored category shows up in the sidebar counts
    let categories = actions::get_categories(&db).unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Uncategorized");
    assert_eq!(categories[0].count, 1);

    // Duplicate URL is rejected before any network call
    let err = actions::save_url(&db, "https://example.com/article")
        .await
        .unwrap_err();
    assert!(err.contains("already saved"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // A failed fetch stores nothing
    let err = actions::save_url(&db, "https://broken.example/page")
        .await
        .unwrap_err();
    assert!(err.contains("Failed to fetch page content"));
    assert_eq!(actions::get_notes(&db, &QueryState::new()).unwrap().len(), 1);

    // Deleting the last note prunes its category from the counts
    actions::delete_note(&db, &notes[0].id).unwrap();
    assert!(actions::get_notes(&db, &QueryState::new()).unwrap().is_empty());
    assert!(actions::get_categories(&db).unwrap().is_empty());
    assert!(actions::get_tags(&db).unwrap().is_empty());
}
