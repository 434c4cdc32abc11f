//! Deterministic segmentation of a chapter into pages of typing chunks.
//!
//! Three passes: the raw text is normalized and cut into sentences (each
//! tagged when it closes a paragraph), sentences are greedily packed into
//! chunks bounded by a word target and a char limit, and chunks are grouped
//! into fixed size pages. A sentence is never split, so a single sentence
//! longer than the char limit becomes its own oversized chunk.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::text_metrics::{char_len, count_words, normalize, split_paragraphs, split_sentences};

pub const DEFAULT_WORDS_PER_CHUNK: usize = 50;
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 300;
pub const DEFAULT_CHUNKS_PER_PAGE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub words_per_chunk: usize,
    pub max_chunk_chars: usize,
    pub chunks_per_page: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            words_per_chunk: DEFAULT_WORDS_PER_CHUNK,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            chunks_per_page: DEFAULT_CHUNKS_PER_PAGE,
        }
    }
}

impl PaginationConfig {
    /// Validated constructor; every limit must be positive.
    pub fn new(
        words_per_chunk: usize,
        max_chunk_chars: usize,
        chunks_per_page: usize,
    ) -> Result<Self> {
        let checks = [
            ("words_per_chunk", words_per_chunk),
            ("max_chunk_chars", max_chunk_chars),
            ("chunks_per_page", chunks_per_page),
        ];
        if let Some(&(name, _)) = checks.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidSetting { name });
        }

        Ok(Self {
            words_per_chunk,
            max_chunk_chars,
            chunks_per_page,
        })
    }
}

/// A sentence borrowed from the normalized chapter text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentence<'a> {
    pub text: &'a str,
    pub word_count: usize,
    pub char_len: usize,
    /// Last sentence of its paragraph.
    pub ends_paragraph: bool,
}

impl<'a> Sentence<'a> {
    fn new(text: &'a str, ends_paragraph: bool) -> Self {
        Self {
            text,
            word_count: count_words(text),
            char_len: char_len(text),
            ends_paragraph,
        }
    }
}

/// Smallest typing unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique within a chapter, ascending from 1.
    pub id: u32,
    pub text: String,
    pub word_count: usize,
    /// Char offsets into `text` at which a paragraph ended.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraph_ends: Vec<usize>,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }

    pub fn ends_paragraph(&self) -> bool {
        self.paragraph_ends.last() == Some(&self.char_len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-indexed and contiguous within a chapter.
    pub number: usize,
    pub chunks: Vec<Chunk>,
}

impl Page {
    pub fn chunk(&self, id: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// Index of the chunk within this page.
    pub fn position_of(&self, id: u32) -> Option<usize> {
        self.chunks.iter().position(|c| c.id == id)
    }

    pub fn word_count(&self) -> usize {
        self.chunks.iter().map(|c| c.word_count).sum()
    }
}

/// Paginates one chapter. Empty or whitespace-only text yields no pages.
pub fn paginate(raw_text: &str, config: &PaginationConfig) -> Vec<Page> {
    let text = normalize(raw_text);
    let sentences = split_into_sentences(&text);
    let chunks = build_chunks(&sentences, config);
    let pages = group_pages(chunks, config.chunks_per_page);

    log::debug!(
        "paginated {} sentences into {} pages ({} chunks)",
        sentences.len(),
        pages.len(),
        total_chunks(&pages)
    );

    pages
}

/// Sentences of normalized text in reading order, paragraph ends tagged.
pub fn split_into_sentences(text: &str) -> Vec<Sentence<'_>> {
    split_paragraphs(text)
        .into_iter()
        .flat_map(|paragraph| {
            let parts = split_sentences(paragraph);
            let last = parts.len().saturating_sub(1);
            parts
                .into_iter()
                .enumerate()
                .map(move |(i, s)| Sentence::new(s, i == last))
        })
        .collect()
}

#[derive(Default)]
struct ChunkBuffer {
    text: String,
    chars: usize,
    words: usize,
    paragraph_ends: Vec<usize>,
}

impl ChunkBuffer {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn len_with(&self, sentence: &Sentence) -> usize {
        if self.is_empty() {
            sentence.char_len
        } else {
            self.chars + 1 + sentence.char_len
        }
    }

    fn push(&mut self, sentence: &Sentence) {
        self.chars = self.len_with(sentence);
        if !self.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(sentence.text);
        self.words += sentence.word_count;
        if sentence.ends_paragraph {
            self.paragraph_ends.push(self.chars);
        }
    }

    fn seal(&mut self, id: u32) -> Chunk {
        let buf = std::mem::take(self);
        Chunk {
            id,
            text: buf.text,
            word_count: buf.words,
            paragraph_ends: buf.paragraph_ends,
        }
    }
}

/// Greedy accumulation: a sentence joins the running chunk unless it would
/// push the chunk past either limit, in which case the chunk is sealed first.
pub fn build_chunks(sentences: &[Sentence], config: &PaginationConfig) -> Vec<Chunk> {
    let words_limit = config.words_per_chunk.max(1);
    let chars_limit = config.max_chunk_chars.max(1);

    let mut chunks = Vec::new();
    let mut buffer = ChunkBuffer::default();
    let mut next_id = 1u32;

    for sentence in sentences {
        let exceeds_words = buffer.words + sentence.word_count > words_limit;
        let exceeds_chars = buffer.len_with(sentence) > chars_limit;

        if (exceeds_words || exceeds_chars) && !buffer.is_empty() {
            chunks.push(buffer.seal(next_id));
            next_id += 1;
        }
        buffer.push(sentence);
    }

    if !buffer.is_empty() {
        chunks.push(buffer.seal(next_id));
    }

    chunks
}

/// Runs of `chunks_per_page` chunks; only the last page may be shorter.
pub fn group_pages(chunks: Vec<Chunk>, chunks_per_page: usize) -> Vec<Page> {
    let groups = chunks.into_iter().chunks(chunks_per_page.max(1));
    let pages: Vec<Page> = groups
        .into_iter()
        .enumerate()
        .map(|(i, group)| Page {
            number: i + 1,
            chunks: group.collect(),
        })
        .collect();
    pages
}

/// The page after `current_page_number`, if any.
pub fn next_page(pages: &[Page], current_page_number: usize) -> Option<&Page> {
    pages.get(current_page_number)
}

/// The page before `current_page_number`, if any.
pub fn previous_page(pages: &[Page], current_page_number: usize) -> Option<&Page> {
    current_page_number
        .checked_sub(2)
        .and_then(|idx| pages.get(idx))
}

pub fn total_chunks(pages: &[Page]) -> usize {
    pages.iter().map(|p| p.chunks.len()).sum()
}

pub fn chapter_word_count(pages: &[Page]) -> usize {
    pages.iter().map(Page::word_count).sum()
}
