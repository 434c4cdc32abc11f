//! Drives one chapter: routes input into the active chunk's typing session,
//! reports completions, and advances through chunks and pages once the
//! advance delay has elapsed.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::pagination::{Chunk, Page};
use crate::session::AdvanceScheduler;
use crate::typing::{InputResult, TypingSession, TypingStats};

/// Supplies a chapter's pages, 1-indexed. The paginated `Vec<Page>` is one;
/// an external content store that loads pages lazily can be another.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page(&self, number: usize) -> Option<Page>;

    fn total_chunks(&self) -> usize {
        (1..=self.page_count())
            .filter_map(|n| self.page(n))
            .map(|p| p.chunks.len())
            .sum()
    }
}

impl PageSource for Vec<Page> {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page(&self, number: usize) -> Option<Page> {
        number.checked_sub(1).and_then(|idx| self.get(idx)).cloned()
    }

    fn total_chunks(&self) -> usize {
        crate::pagination::total_chunks(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub page_number: usize,
    pub chunk_id: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    ChunkCompleted {
        position: Position,
        /// 1-based index of the chunk within the chapter.
        chunk_number: usize,
        stats: TypingStats,
    },
    PageCompleted {
        page_number: usize,
        stats: TypingStats,
    },
    ChapterCompleted {
        stats: TypingStats,
    },
    /// A new chunk is active and accepting input.
    Advanced { position: Position },
}

/// Result of routing one input change through the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderUpdate {
    pub input: InputResult,
    pub events: Vec<ReaderEvent>,
}

#[derive(Debug)]
pub struct ChapterReader<S: PageSource> {
    source: S,
    page: Page,
    chunk_index: usize,
    session: TypingSession,
    scheduler: AdvanceScheduler,
    total_chunks: usize,
    chunks_before_page: usize,
    completed_chunks: usize,
    page_stats: Vec<TypingStats>,
    history: Vec<TypingStats>,
    finished: bool,
}

impl<S: PageSource> ChapterReader<S> {
    /// Opens the chapter at its first chunk.
    pub fn new(source: S, advance_delay: Duration) -> Result<Self> {
        let page = source
            .page(1)
            .filter(|p| !p.chunks.is_empty())
            .ok_or(Error::EmptyChapter)?;
        let session = TypingSession::new(page.chunks[0].text.clone());
        let total_chunks = source.total_chunks();

        Ok(Self {
            source,
            page,
            chunk_index: 0,
            session,
            scheduler: AdvanceScheduler::new(advance_delay),
            total_chunks,
            chunks_before_page: 0,
            completed_chunks: 0,
            page_stats: Vec::new(),
            history: Vec::new(),
            finished: false,
        })
    }

    pub fn session(&self) -> &TypingSession {
        &self.session
    }

    pub fn current_page(&self) -> &Page {
        &self.page
    }

    pub fn current_chunk(&self) -> &Chunk {
        &self.page.chunks[self.chunk_index]
    }

    pub fn position(&self) -> Position {
        Position {
            page_number: self.page.number,
            chunk_id: self.current_chunk().id,
        }
    }

    /// 1-based index of the chunk within the page.
    pub fn chunk_in_page(&self) -> usize {
        self.chunk_index + 1
    }

    /// 1-based index of the chunk within the chapter.
    pub fn chunk_number(&self) -> usize {
        self.chunks_before_page + self.chunk_index + 1
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    /// Completed chunks over chapter chunks, rounded to a whole percent.
    pub fn progress_percent(&self) -> u32 {
        if self.total_chunks == 0 {
            return 0;
        }
        ((self.completed_chunks as f64 / self.total_chunks as f64) * 100.0).round() as u32
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_advance_pending(&self) -> bool {
        self.scheduler.is_armed()
    }

    /// Completion snapshots of the chunks typed in this reader, in order.
    pub fn history(&self) -> &[TypingStats] {
        &self.history
    }

    pub fn chapter_stats(&self) -> TypingStats {
        TypingStats::aggregate(&self.history)
    }

    pub fn on_input(&mut self, new_value: &str) -> ReaderUpdate {
        self.on_input_at(new_value, SystemTime::now())
    }

    pub fn on_input_at(&mut self, new_value: &str, now: SystemTime) -> ReaderUpdate {
        let input = self.session.on_input_at(new_value, now);
        self.after_input(input, now)
    }

    pub fn type_char_at(&mut self, c: char, now: SystemTime) -> ReaderUpdate {
        let input = self.session.type_char_at(c, now);
        self.after_input(input, now)
    }

    pub fn backspace_at(&mut self, now: SystemTime) -> ReaderUpdate {
        let input = self.session.backspace_at(now);
        self.after_input(input, now)
    }

    pub fn paste_at(&mut self, text: &str, now: SystemTime) -> ReaderUpdate {
        let input = self.session.paste_at(text, now);
        self.after_input(input, now)
    }

    fn after_input(&mut self, input: InputResult, now: SystemTime) -> ReaderUpdate {
        let events = match input {
            InputResult::Accepted {
                stats,
                completed: true,
            } => self.on_chunk_completed(stats, now),
            _ => Vec::new(),
        };
        ReaderUpdate { input, events }
    }

    fn on_chunk_completed(&mut self, stats: TypingStats, now: SystemTime) -> Vec<ReaderEvent> {
        self.completed_chunks += 1;
        self.page_stats.push(stats);
        self.history.push(stats);

        let mut events = vec![ReaderEvent::ChunkCompleted {
            position: self.position(),
            chunk_number: self.chunk_number(),
            stats,
        }];

        if self.chunk_index + 1 < self.page.chunks.len() {
            self.scheduler.arm(now);
            return events;
        }

        events.push(ReaderEvent::PageCompleted {
            page_number: self.page.number,
            stats: TypingStats::aggregate(&self.page_stats),
        });

        if self.page.number < self.source.page_count() {
            self.scheduler.arm(now);
        } else {
            self.finished = true;
            log::debug!("chapter finished after {} chunks", self.completed_chunks);
            events.push(ReaderEvent::ChapterCompleted {
                stats: self.chapter_stats(),
            });
        }

        events
    }

    /// Fires the pending advance once its delay has elapsed.
    pub fn on_tick(&mut self, now: SystemTime) -> Option<ReaderEvent> {
        self.scheduler.poll(now)?;
        self.advance()
    }

    fn advance(&mut self) -> Option<ReaderEvent> {
        if self.chunk_index + 1 < self.page.chunks.len() {
            self.chunk_index += 1;
        } else {
            let next_number = self.page.number + 1;
            let Some(next) = self.source.page(next_number).filter(|p| !p.chunks.is_empty())
            else {
                log::warn!("page {next_number} unavailable, ending chapter");
                self.finished = true;
                return None;
            };
            self.chunks_before_page += self.page.chunks.len();
            self.page = next;
            self.chunk_index = 0;
            self.page_stats.clear();
        }

        self.session.load(self.current_chunk().text.clone());
        let position = self.position();
        log::debug!(
            "advanced to page {} chunk {}",
            position.page_number,
            position.chunk_id
        );
        Some(ReaderEvent::Advanced { position })
    }

    /// Drops a pending advance, e.g. when the user navigates away.
    pub fn cancel_pending(&mut self) -> bool {
        self.scheduler.cancel()
    }

    /// Starts the active chunk over. A completion that was already reported
    /// for it is withdrawn so retyping it is not counted twice.
    pub fn restart_chunk(&mut self) {
        self.scheduler.cancel();
        if self.session.is_complete() {
            self.completed_chunks = self.completed_chunks.saturating_sub(1);
            self.page_stats.pop();
            self.history.pop();
            self.finished = false;
        }
        self.session.reset();
    }

    /// Makes `position` the active chunk.
    pub fn jump_to(&mut self, position: Position) -> Result<()> {
        let page = self
            .source
            .page(position.page_number)
            .ok_or(Error::PageOutOfRange(position.page_number))?;
        let chunk_index = page
            .position_of(position.chunk_id)
            .ok_or(Error::ChunkNotOnPage {
                page_number: position.page_number,
                chunk_id: position.chunk_id,
            })?;

        self.scheduler.cancel();
        self.chunks_before_page = (1..position.page_number)
            .filter_map(|n| self.source.page(n))
            .map(|p| p.chunks.len())
            .sum();
        self.page = page;
        self.chunk_index = chunk_index;
        self.completed_chunks = self.chunk_number() - 1;
        self.page_stats.clear();
        self.history.clear();
        self.finished = false;
        self.session.load(self.current_chunk().text.clone());
        Ok(())
    }

    /// Positions the reader on the chunk following `last`. Returns false
    /// when `last` was the final chunk, in which case the chapter starts over.
    pub fn resume_after(&mut self, last: Position) -> Result<bool> {
        let page = self
            .source
            .page(last.page_number)
            .ok_or(Error::PageOutOfRange(last.page_number))?;
        let idx = page.position_of(last.chunk_id).ok_or(Error::ChunkNotOnPage {
            page_number: last.page_number,
            chunk_id: last.chunk_id,
        })?;

        let next = if let Some(chunk) = page.chunks.get(idx + 1) {
            Some(Position {
                page_number: page.number,
                chunk_id: chunk.id,
            })
        } else {
            self.source
                .page(page.number + 1)
                .and_then(|p| p.chunks.first().map(|c| (p.number, c.id)))
                .map(|(page_number, chunk_id)| Position {
                    page_number,
                    chunk_id,
                })
        };

        match next {
            Some(position) => {
                self.jump_to(position)?;
                Ok(true)
            }
            None => {
                let first = self.source.page(1).ok_or(Error::EmptyChapter)?;
                let chunk_id = first.chunks.first().ok_or(Error::EmptyChapter)?.id;
                self.jump_to(Position {
                    page_number: 1,
                    chunk_id,
                })?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{paginate, PaginationConfig};
    use assert_matches::assert_matches;
    use std::cell::Cell;

    const DELAY: Duration = Duration::from_millis(1000);

    fn at(ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(1_000_000 + ms)
    }

    // five one-sentence chunks, two per page -> pages of 2, 2, 1
    fn pages() -> Vec<Page> {
        let cfg = PaginationConfig::new(2, 300, 2).unwrap();
        paginate("Aa bb. Cc dd. Ee ff. Gg hh. Ii jj.", &cfg)
    }

    fn type_current(reader: &mut ChapterReader<Vec<Page>>, now: SystemTime) -> ReaderUpdate {
        let text = reader.current_chunk().text.clone();
        reader.on_input_at(&text[..1], now);
        reader.on_input_at(&text, now + Duration::from_secs(3))
    }

    #[test]
    fn test_starts_on_first_chunk() {
        let reader = ChapterReader::new(pages(), DELAY).unwrap();
        assert_eq!(
            reader.position(),
            Position {
                page_number: 1,
                chunk_id: 1
            }
        );
        assert_eq!(reader.session().reference(), "Aa bb.");
        assert_eq!(reader.chunk_number(), 1);
        assert_eq!(reader.total_chunks(), 5);
        assert_eq!(reader.page_count(), 3);
        assert_eq!(reader.progress_percent(), 0);
    }

    #[test]
    fn test_empty_chapter_is_an_error() {
        let result = ChapterReader::new(Vec::<Page>::new(), DELAY);
        assert_matches!(result, Err(Error::EmptyChapter));
    }

    #[test]
    fn test_chunk_completion_arms_advance() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        let update = type_current(&mut reader, at(0));

        assert!(update.input.completed());
        assert_matches!(
            update.events.as_slice(),
            [ReaderEvent::ChunkCompleted {
                chunk_number: 1,
                ..
            }]
        );
        assert!(reader.is_advance_pending());

        // still on the completed chunk until the delay passes
        assert_eq!(reader.on_tick(at(3_500)), None);
        assert_eq!(reader.position().chunk_id, 1);

        let advanced = reader.on_tick(at(4_000));
        assert_matches!(
            advanced,
            Some(ReaderEvent::Advanced {
                position: Position {
                    page_number: 1,
                    chunk_id: 2
                }
            })
        );
        assert_eq!(reader.session().reference(), "Cc dd.");
        assert!(!reader.session().has_started());
    }

    #[test]
    fn test_completion_stats_are_the_snapshot() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        let update = type_current(&mut reader, at(0));
        let ReaderEvent::ChunkCompleted { stats, .. } = &update.events[0] else {
            panic!("expected chunk completion");
        };
        assert_eq!(stats.time_elapsed_secs, 3.0);
        assert_eq!(stats.accuracy, 100);
        assert_eq!(Some(*stats), reader.session().completion_stats());
    }

    #[test]
    fn test_page_boundary_pulls_next_page() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();

        type_current(&mut reader, at(0));
        reader.on_tick(at(10_000));
        let update = type_current(&mut reader, at(20_000));

        assert_matches!(
            update.events.as_slice(),
            [
                ReaderEvent::ChunkCompleted { chunk_number: 2, .. },
                ReaderEvent::PageCompleted { page_number: 1, .. }
            ]
        );

        let advanced = reader.on_tick(at(30_000));
        assert_matches!(
            advanced,
            Some(ReaderEvent::Advanced {
                position: Position {
                    page_number: 2,
                    chunk_id: 3
                }
            })
        );
        assert_eq!(reader.chunk_in_page(), 1);
        assert_eq!(reader.chunk_number(), 3);
        assert_eq!(reader.progress_percent(), 40);
    }

    #[test]
    fn test_page_stats_aggregate_page_chunks() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        type_current(&mut reader, at(0));
        reader.on_tick(at(10_000));
        let update = type_current(&mut reader, at(20_000));

        let page_stats = update
            .events
            .iter()
            .find_map(|e| match e {
                ReaderEvent::PageCompleted { stats, .. } => Some(*stats),
                _ => None,
            })
            .unwrap();
        assert_eq!(page_stats.correct_chars, 12);
        assert_eq!(page_stats.time_elapsed_secs, 6.0);
    }

    #[test]
    fn test_whole_chapter() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        let mut now = 0;
        let mut last = None;

        while !reader.is_finished() {
            last = Some(type_current(&mut reader, at(now)));
            now += 10_000;
            reader.on_tick(at(now));
        }

        let last = last.unwrap();
        assert_matches!(
            last.events.as_slice(),
            [
                ReaderEvent::ChunkCompleted { chunk_number: 5, .. },
                ReaderEvent::PageCompleted { page_number: 3, .. },
                ReaderEvent::ChapterCompleted { .. }
            ]
        );
        assert!(!reader.is_advance_pending());
        assert_eq!(reader.history().len(), 5);
        assert_eq!(reader.progress_percent(), 100);
        assert_eq!(reader.chapter_stats().correct_chars, 30);
    }

    #[test]
    fn test_cancel_pending_keeps_session() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        type_current(&mut reader, at(0));

        assert!(reader.cancel_pending());
        assert_eq!(reader.on_tick(at(60_000)), None);
        assert_eq!(reader.position().chunk_id, 1);
        assert!(reader.session().is_complete());
    }

    #[test]
    fn test_input_after_completion_is_ignored() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        type_current(&mut reader, at(0));
        let update = reader.on_input_at("Aa bb.", at(3_100));
        assert!(update.events.is_empty());
        assert!(!update.input.completed());
    }

    #[test]
    fn test_restart_withdraws_completion() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        type_current(&mut reader, at(0));
        assert_eq!(reader.history().len(), 1);

        reader.restart_chunk();
        assert!(!reader.is_advance_pending());
        assert!(reader.history().is_empty());
        assert_eq!(reader.progress_percent(), 0);
        assert_eq!(reader.session().input(), "");

        let update = type_current(&mut reader, at(5_000));
        assert!(update.input.completed());
        assert_eq!(reader.history().len(), 1);
    }

    #[test]
    fn test_keystroke_helpers() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        for (i, c) in "Aa bx".chars().enumerate() {
            reader.type_char_at(c, at(i as u64 * 100));
        }
        reader.backspace_at(at(600));
        let update = reader.paste_at("b.", at(700));
        assert!(update.input.completed());
    }

    #[test]
    fn test_jump_to_and_resume() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        reader
            .jump_to(Position {
                page_number: 2,
                chunk_id: 4,
            })
            .unwrap();
        assert_eq!(reader.session().reference(), "Gg hh.");
        assert_eq!(reader.chunk_number(), 4);
        assert_eq!(reader.progress_percent(), 60);

        let resumed = reader
            .resume_after(Position {
                page_number: 2,
                chunk_id: 4,
            })
            .unwrap();
        assert!(resumed);
        assert_eq!(
            reader.position(),
            Position {
                page_number: 3,
                chunk_id: 5
            }
        );
    }

    #[test]
    fn test_resume_after_last_chunk_starts_over() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        let resumed = reader
            .resume_after(Position {
                page_number: 3,
                chunk_id: 5,
            })
            .unwrap();
        assert!(!resumed);
        assert_eq!(reader.chunk_number(), 1);
    }

    #[test]
    fn test_jump_rejects_unknown_positions() {
        let mut reader = ChapterReader::new(pages(), DELAY).unwrap();
        assert_matches!(
            reader.jump_to(Position {
                page_number: 9,
                chunk_id: 1
            }),
            Err(Error::PageOutOfRange(9))
        );
        assert_matches!(
            reader.jump_to(Position {
                page_number: 1,
                chunk_id: 5
            }),
            Err(Error::ChunkNotOnPage {
                page_number: 1,
                chunk_id: 5
            })
        );
    }

    /// Stands in for an external store that hands out pages on request.
    struct LazySource {
        pages: Vec<Page>,
        fetches: Cell<usize>,
    }

    impl PageSource for LazySource {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page(&self, number: usize) -> Option<Page> {
            self.fetches.set(self.fetches.get() + 1);
            self.pages.page(number)
        }
    }

    #[test]
    fn test_next_page_is_fetched_on_boundary() {
        let source = LazySource {
            pages: pages(),
            fetches: Cell::new(0),
        };
        let mut reader = ChapterReader::new(source, Duration::ZERO).unwrap();
        assert_eq!(reader.total_chunks(), 5);
        let fetched_at_open = reader.source.fetches.get();

        type_current_generic(&mut reader, at(0));
        reader.on_tick(at(5_000));
        assert_eq!(reader.source.fetches.get(), fetched_at_open);

        type_current_generic(&mut reader, at(10_000));
        reader.on_tick(at(15_000));
        assert_eq!(reader.source.fetches.get(), fetched_at_open + 1);
        assert_eq!(reader.current_page().number, 2);
    }

    fn type_current_generic<S: PageSource>(reader: &mut ChapterReader<S>, now: SystemTime) {
        let text = reader.current_chunk().text.clone();
        reader.on_input_at(&text, now);
    }
}
