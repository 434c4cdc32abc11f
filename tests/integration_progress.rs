use std::time::{Duration, SystemTime};

use chrono::Local;
use tempfile::tempdir;
use tovel::{
    pagination::{paginate, PaginationConfig},
    progress::{chapter_id, ProgressRecord, ProgressStore, SqliteProgressStore},
    reader::{ChapterReader, Position, ReaderEvent},
};

const CHAPTER: &str = "One two. Three four.\n\nFive six. Seven eight.";

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
}

// Types the active chunk with one keystroke per second and records the
// completion the way the terminal app does.
fn type_and_record(
    reader: &mut ChapterReader<Vec<tovel::pagination::Page>>,
    store: &mut SqliteProgressStore,
    id: &str,
    start: u64,
) {
    let text = reader.current_chunk().text.clone();
    let mut events = Vec::new();
    for (i, c) in text.chars().enumerate() {
        events.extend(reader.type_char_at(c, at(start + i as u64)).events);
    }
    for event in events {
        if let ReaderEvent::ChunkCompleted {
            position,
            chunk_number,
            stats,
        } = event
        {
            store
                .record(&ProgressRecord {
                    chapter_id: id.to_string(),
                    page_number: position.page_number,
                    chunk_id: position.chunk_id,
                    chunk_number,
                    total_chunks: reader.total_chunks(),
                    stats,
                    recorded_at: Local::now(),
                })
                .unwrap();
        }
    }
    reader.on_tick(at(start + 1_000));
}

fn two_per_page() -> PaginationConfig {
    PaginationConfig::new(2, 300, 2).unwrap()
}

fn reader() -> ChapterReader<Vec<tovel::pagination::Page>> {
    let pages = paginate(CHAPTER, &two_per_page());
    ChapterReader::new(pages, Duration::from_secs(1)).unwrap()
}

#[test]
fn progress_survives_reopening_the_database() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("state").join("progress.db");
    let id = chapter_id(CHAPTER, &two_per_page());

    {
        let mut store = SqliteProgressStore::open(&db).unwrap();
        let mut reader = reader();
        type_and_record(&mut reader, &mut store, &id, 0);
        type_and_record(&mut reader, &mut store, &id, 100);
    }

    let store = SqliteProgressStore::open(&db).unwrap();
    let records = store.chapter_records(&id).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].chunk_number, 1);
    assert_eq!(records[1].chunk_number, 2);
    assert!(records.iter().all(|r| r.total_chunks == 4));
    assert!(records.iter().all(|r| r.stats.accuracy == 100));

    assert_eq!(
        store.last_position(&id).unwrap(),
        Some(Position {
            page_number: 1,
            chunk_id: 2
        })
    );

    let summary = store.chapter_summary(&id).unwrap().unwrap();
    assert_eq!(summary.chunks_typed, 2);
    assert_eq!(summary.progress_percent(), 50);
    assert!(summary.last_recorded_at.is_some());
}

#[test]
fn resume_picks_up_on_the_next_page() {
    let dir = tempdir().unwrap();
    let mut store = SqliteProgressStore::open(dir.path().join("progress.db")).unwrap();
    let id = chapter_id(CHAPTER, &two_per_page());

    let mut first_run = reader();
    type_and_record(&mut first_run, &mut store, &id, 0);
    type_and_record(&mut first_run, &mut store, &id, 100);
    drop(first_run);

    let mut second_run = reader();
    let last = store.last_position(&id).unwrap().unwrap();
    assert!(second_run.resume_after(last).unwrap());
    assert_eq!(
        second_run.position(),
        Position {
            page_number: 2,
            chunk_id: 3
        }
    );
    assert_eq!(second_run.chunk_number(), 3);
    assert_eq!(second_run.progress_percent(), 50);

    type_and_record(&mut second_run, &mut store, &id, 200);
    type_and_record(&mut second_run, &mut store, &id, 300);
    assert!(second_run.is_finished());

    let summary = store.chapter_summary(&id).unwrap().unwrap();
    assert_eq!(summary.distinct_chunks, 4);
    assert_eq!(summary.progress_percent(), 100);
}

#[test]
fn clearing_a_chapter_resets_resume() {
    let dir = tempdir().unwrap();
    let mut store = SqliteProgressStore::open(dir.path().join("progress.db")).unwrap();
    let id = chapter_id(CHAPTER, &two_per_page());

    let mut run = reader();
    type_and_record(&mut run, &mut store, &id, 0);
    assert_eq!(store.clear_chapter(&id).unwrap(), 1);
    assert_eq!(store.last_position(&id).unwrap(), None);
    assert_eq!(store.chapter_summary(&id).unwrap(), None);
}

#[test]
fn progress_is_kept_per_pagination() {
    let dir = tempdir().unwrap();
    let mut store = SqliteProgressStore::open(dir.path().join("progress.db")).unwrap();
    let id = chapter_id(CHAPTER, &two_per_page());

    let mut run = reader();
    type_and_record(&mut run, &mut store, &id, 0);
    type_and_record(&mut run, &mut store, &id, 100);
    type_and_record(&mut run, &mut store, &id, 200);

    let one_page = PaginationConfig::new(2, 300, 4).unwrap();
    let other_id = chapter_id(CHAPTER, &one_page);
    assert_ne!(id, other_id);
    assert_eq!(store.last_position(&other_id).unwrap(), None);
    assert_eq!(store.chapter_summary(&other_id).unwrap(), None);

    // the position recorded under two chunks per page names page 2,
    // which does not exist once every chunk fits on one page
    let last = store.last_position(&id).unwrap().unwrap();
    assert_eq!(last.page_number, 2);
    let mut repaginated =
        ChapterReader::new(paginate(CHAPTER, &one_page), Duration::from_secs(1)).unwrap();
    assert!(repaginated.resume_after(last).is_err());
    assert_eq!(repaginated.chunk_number(), 1);
}
