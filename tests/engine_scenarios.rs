//! End-to-end scenarios driving `LineEngine` with in-memory collaborators

mod common;

use common::tracing::init_tracing_from_env;
use common::{numbered_lines, FileSource, TaggingHighlighter};
use lineview::config::EngineConfig;
use lineview::primitives::highlight_cache::Theme;
use lineview::services::loader::{Direction, ScrollEvent};
use lineview::{EngineEvent, LineEngine};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const VIEWPORT_HEIGHT: f64 = 200.0;

fn event_for(engine: &LineEngine, scroll_top: f64) -> ScrollEvent {
    ScrollEvent {
        scroll_top,
        viewport_height: VIEWPORT_HEIGHT,
        content_height: engine.total_rendered_height(),
    }
}

/// Engine showing lines `start..start + count` of a 1000-line file
fn engine_over(source: &FileSource, start: usize, count: usize) -> LineEngine {
    init_tracing_from_env();
    let mut engine = LineEngine::default();
    engine.resize(VIEWPORT_HEIGHT);
    let (lines, first_line_number, offset) = source.window(start, count);
    engine.load_file(None, lines, first_line_number, offset);
    engine
}

fn recorded_events(engine: &mut LineEngine) -> Arc<Mutex<Vec<EngineEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
    events
}

#[tokio::test]
async fn test_prepend_keeps_the_same_line_on_screen() {
    let mut source = FileSource::new(numbered_lines(1000), 100);
    let mut engine = engine_over(&source, 500, 200);

    assert_eq!(engine.handle_scroll(event_for(&engine, 100.0), &mut source).await, 0);
    assert_eq!(engine.handle_scroll(event_for(&engine, 70.0), &mut source).await, 0);

    let (index, offset) = engine.viewport().first_visible().unwrap();
    let before = engine.visible().line(engine.buffer(), index).unwrap().to_string();
    assert_eq!((index, offset), (3, 10.0));

    // Second upward event within 50px of the top
    let added = engine
        .handle_scroll(event_for(&engine, 45.0), &mut source)
        .await;
    assert_eq!(added, 100);
    assert_eq!(source.calls(), 1);

    let (restored, restored_offset) = engine.viewport().first_visible().unwrap();
    assert_eq!(restored, 2 + 100);
    assert_eq!(restored_offset, 5.0);
    assert_eq!(
        engine.visible().line(engine.buffer(), restored),
        Some("line 502")
    );
    assert_ne!(before, "line 502");
    assert_eq!(engine.buffer().first_line_number(), 401);
}

#[tokio::test]
async fn test_small_upward_deltas_do_not_load() {
    let mut source = FileSource::new(numbered_lines(1000), 50);
    let mut engine = engine_over(&source, 500, 200);

    for scroll_top in [40.0, 37.0, 34.0, 31.0] {
        engine
            .handle_scroll(event_for(&engine, scroll_top), &mut source)
            .await;
    }
    assert_eq!(source.calls(), 0);

    engine.handle_scroll(event_for(&engine, 25.0), &mut source).await;
    assert_eq!(source.calls(), 0);
    engine.handle_scroll(event_for(&engine, 19.0), &mut source).await;
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_bottom_load_appends_without_moving() {
    let mut source = FileSource::new(numbered_lines(1000), 100);
    let mut engine = engine_over(&source, 0, 200);
    let events = recorded_events(&mut engine);

    // 200 lines * 20px = 4000px of content
    engine.handle_scroll(event_for(&engine, 3650.0), &mut source).await;
    let added = engine
        .handle_scroll(event_for(&engine, 3700.0), &mut source)
        .await;
    assert_eq!(added, 100);
    assert_eq!(engine.buffer().len(), 300);
    assert_eq!(engine.viewport().scroll_top(), 3700.0);
    assert_eq!(engine.buffer().line(299), Some("line 299"));

    let spliced = events
        .lock()
        .unwrap()
        .iter()
        .any(|e| {
            *e == EngineEvent::BufferSpliced {
                direction: Direction::Bottom,
                lines_added: 100,
                line_count: 300,
            }
        });
    assert!(spliced);
}

#[tokio::test]
async fn test_failed_load_leaves_buffer_untouched() {
    let mut source = FileSource::new(numbered_lines(1000), 100);
    source.failing = true;
    let mut engine = engine_over(&source, 500, 200);

    let added = engine.load_more(Direction::Top, &mut source).await;
    assert_eq!(added, 0);
    assert_eq!(source.calls(), 1);
    assert_eq!(engine.buffer().len(), 200);
    assert_eq!(engine.buffer().first_line_number(), 501);

    // The lock expires on its own, then the edge can be retried
    let now = Instant::now();
    assert!(engine.begin_load(Direction::Top, now).is_none());
    source.failing = false;
    let later = now + Duration::from_millis(engine.config().loader.lock_timeout_ms);
    let ticket = engine.begin_load(Direction::Top, later).unwrap();
    assert_eq!(engine.fulfill(ticket, &mut source).await, 100);
    assert_eq!(engine.buffer().first_line_number(), 401);
}

#[tokio::test]
async fn test_late_completion_is_applied_but_keeps_newer_lock() {
    let source = FileSource::new(numbered_lines(1000), 100);
    let mut engine = engine_over(&source, 0, 200);
    let start = Instant::now();
    let expired = start + Duration::from_millis(2_000);

    let stale = engine.begin_load(Direction::Bottom, start).unwrap();
    let fresh = engine.begin_load(Direction::Bottom, expired).unwrap();

    let (late_lines, _, _) = source.window(200, 10);
    assert_eq!(engine.complete_load(&stale, late_lines), 10);
    assert!(engine.begin_load(Direction::Bottom, expired).is_none());

    let (more, _, _) = source.window(210, 10);
    engine.complete_load(&fresh, more);
    assert!(engine.begin_load(Direction::Bottom, expired).is_some());
    assert_eq!(engine.buffer().len(), 220);
}

#[test]
fn test_search_is_bounded_and_notified() {
    init_tracing_from_env();
    let mut engine = LineEngine::default();
    let events = recorded_events(&mut engine);
    let lines: Vec<String> = (0..2000).map(|i| format!("{i}: x")).collect();
    engine.load_file(None, lines, 1, 0);

    let outcome = engine.search("X").clone();
    assert_eq!(outcome.results.len(), 1000);
    assert!(outcome.is_limited);
    assert_eq!(outcome.results[999].line, 1000);

    let notified = events.lock().unwrap().iter().any(|e| {
        matches!(e, EngineEvent::SearchResults { results, is_limited: true } if results.len() == 1000)
    });
    assert!(notified);
}

#[test]
fn test_search_below_cap_is_exact() {
    let mut engine = LineEngine::default();
    let lines: Vec<String> = (0..500).map(|i| format!("{i} x x")).collect();
    engine.load_file(None, lines, 1, 0);
    let outcome = engine.search("x");
    assert_eq!(outcome.results.len(), 1000);
    assert!(!outcome.is_limited);

    engine.load_file(None, numbered_lines(10), 1, 0);
    let outcome = engine.search("line 3");
    assert_eq!(outcome.results.len(), 1);
    assert!(!outcome.is_limited);
}

#[tokio::test]
async fn test_appending_many_lines_reruns_search() {
    let source = FileSource::new(numbered_lines(1000), 100);
    let mut engine = engine_over(&source, 0, 100);
    engine.search("line 1");
    let before = engine.search_results().len();

    let ticket = engine.begin_load(Direction::Bottom, Instant::now()).unwrap();
    let (lines, _, _) = source.window(100, 100);
    engine.complete_load(&ticket, lines);
    // +100 lines is within the re-run threshold
    assert_eq!(engine.search_results().len(), before);

    let ticket = engine.begin_load(Direction::Bottom, Instant::now()).unwrap();
    let (lines, _, _) = source.window(200, 300);
    engine.complete_load(&ticket, lines);
    assert!(engine.search_results().len() > before);
}

#[tokio::test]
async fn test_theme_switch_invalidates_highlights() {
    init_tracing_from_env();
    let mut config = EngineConfig::default();
    config.viewport.overscan = 0;
    let mut engine = LineEngine::new(config);
    // 51 rows of 20px
    engine.resize(1020.0);
    let lines: Vec<String> = (0..200).map(|i| format!("key{i}: value")).collect();
    engine.load_file(Some(Path::new("settings.yaml")), lines, 1, 0);
    assert_eq!(engine.rendered_range(), Some((0, 50)));

    let service = TaggingHighlighter::default();
    assert_eq!(engine.refresh_highlights(&service).await, 51);
    assert!(engine
        .rendered_lines()
        .iter()
        .all(|l| l.markup.as_deref().is_some_and(|m| m.contains("light"))));
    assert_eq!(engine.refresh_highlights(&service).await, 0);

    engine.set_theme(Theme::Dark);
    assert_eq!(engine.highlights().len(), 0);
    assert!(engine.rendered_lines().iter().all(|l| l.markup.is_none()));

    assert_eq!(engine.refresh_highlights(&service).await, 51);
    let first = engine.rendered_lines()[0].markup.clone().unwrap();
    assert!(first.contains("data-theme=\"dark\""));
    assert!(first.contains("data-lang=\"yaml\""));
}

#[tokio::test]
async fn test_new_content_invalidates_highlights() {
    let mut source = FileSource::new(numbered_lines(1000), 100);
    let mut engine = engine_over(&source, 0, 200);
    engine.set_language(Some(lineview::primitives::Language::Rust));
    let service = TaggingHighlighter::default();
    assert!(engine.refresh_highlights(&service).await > 0);

    engine.load_more(Direction::Bottom, &mut source).await;
    assert!(engine.highlights().is_empty());
}

#[test]
fn test_plain_text_is_never_highlighted() {
    let mut engine = LineEngine::default();
    engine.resize(VIEWPORT_HEIGHT);
    engine.load_file(Some(Path::new("notes.txt")), numbered_lines(50), 1, 0);
    assert_eq!(engine.language(), None);
    assert!(engine.plan_highlights().is_none());
}

#[tokio::test]
async fn test_switching_files_drops_old_markup() {
    let mut engine = LineEngine::default();
    engine.resize(VIEWPORT_HEIGHT);
    let service = TaggingHighlighter::default();

    let old: Vec<String> = (0..50).map(|i| format!("fn old_{i}() {{}}")).collect();
    engine.load_file(Some(Path::new("a.rs")), old, 1, 0);
    assert!(engine.refresh_highlights(&service).await > 0);

    let new: Vec<String> = (0..50).map(|i| format!("fn new_{i}() {{}}")).collect();
    engine.load_file(Some(Path::new("b.rs")), new, 1, 0);
    assert!(engine.rendered_lines().iter().all(|l| l.markup.is_none()));

    assert!(engine.refresh_highlights(&service).await > 0);
    let first = engine.rendered_lines()[0].markup.clone().unwrap();
    assert!(first.contains("fn new_0() {}"));
}

#[tokio::test]
async fn test_load_for_a_replaced_file_is_not_spliced() {
    let mut source = FileSource::new(numbered_lines(1000), 100);
    let mut engine = engine_over(&source, 0, 200);
    let ticket = engine.begin_load(Direction::Bottom, Instant::now()).unwrap();

    engine.load_file(None, numbered_lines(10), 1, 0);
    assert_eq!(engine.fulfill(ticket, &mut source).await, 0);
    assert_eq!(source.calls(), 1);
    assert_eq!(engine.buffer().len(), 10);
    assert_eq!(engine.buffer().line(9), Some("line 9"));

    // Loads for the new file still go through
    let ticket = engine.begin_load(Direction::Bottom, Instant::now()).unwrap();
    assert_eq!(engine.fulfill(ticket, &mut source).await, 100);
    assert_eq!(engine.buffer().len(), 110);
}

#[test]
fn test_switching_files_resets_search_and_folds() {
    init_tracing_from_env();
    let mut engine = LineEngine::default();
    let events = recorded_events(&mut engine);
    let first = ["{", "  \"a\": {", "    \"b\": 1", "  }", "}"];
    engine.load_file(Some(Path::new("first.json")), first, 1, 0);
    engine.collapse_all();
    assert_eq!(engine.search("b").results.len(), 0);
    engine.expand_all();
    assert_eq!(engine.search("\"b\"").results.len(), 1);
    engine.collapse_all();
    assert!(engine.folding().has_collapsed());

    let second = ["[", "  1,", "  2", "]"];
    engine.load_file(Some(Path::new("second.json")), second, 1, 0);
    assert!(!engine.folding().has_collapsed());
    assert_eq!(engine.folding().len(), 1);
    assert_eq!(engine.visible().len(), 4);
    assert!(engine.search_results().is_empty());
    assert_eq!(engine.search_engine().term(), "");

    let last_search = events
        .lock()
        .unwrap()
        .iter()
        .rev()
        .find_map(|e| match e {
            EngineEvent::SearchResults { results, .. } => Some(results.len()),
            _ => None,
        });
    assert_eq!(last_search, Some(0));
}
