//! Small text helpers shared by the paginator and the typing engine.
//!
//! Lengths are measured in chars so that a chunk bound and a typed position
//! always agree with each other, whatever the script of the chapter.

/// Characters that close a sentence when followed by whitespace.
pub const SENTENCE_TERMINALS: [char; 3] = ['.', '!', '?'];

pub fn is_sentence_terminal(c: char) -> bool {
    SENTENCE_TERMINALS.contains(&c)
}

/// Number of whitespace separated words; surrounding whitespace is ignored.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Turns `\r\n` and lone `\r` into `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Collapses every run of three or more newlines into a paragraph break.
pub fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        push_newlines(&mut out, newlines);
        newlines = 0;
        out.push(c);
    }
    push_newlines(&mut out, newlines);
    out
}

fn push_newlines(out: &mut String, count: usize) {
    for _ in 0..count.min(2) {
        out.push('\n');
    }
}

/// Every whitespace run becomes typeable: a run without a line break turns
/// into one space, a run with line breaks keeps only the `\n`s.
///
/// Expects `\n` line endings.
pub fn collapse_inline_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run: Option<usize> = None;
    for c in text.chars() {
        if c.is_whitespace() {
            let newlines = run.get_or_insert(0);
            if c == '\n' {
                *newlines += 1;
            }
            continue;
        }
        flush_run(&mut out, run.take());
        out.push(c);
    }
    flush_run(&mut out, run);
    out
}

fn flush_run(out: &mut String, run: Option<usize>) {
    match run {
        Some(0) => out.push(' '),
        Some(newlines) => out.extend(std::iter::repeat('\n').take(newlines)),
        None => {}
    }
}

/// Line endings normalized, whitespace made typeable, blank runs collapsed,
/// ends trimmed.
pub fn normalize(text: &str) -> String {
    collapse_blank_runs(&collapse_inline_whitespace(&normalize_line_endings(text)))
        .trim()
        .to_string()
}

/// Splits on blank lines (a newline, optional whitespace, another newline).
///
/// Single newlines stay inside their paragraph. Expects `\n` line endings.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split('\n') {
        let line_start = offset;
        let line_end = offset + line.len();
        offset = line_end + 1;

        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                paragraphs.push(&text[s..end]);
            }
        } else {
            start.get_or_insert(line_start);
            end = line_end;
        }
    }

    if let Some(s) = start {
        paragraphs.push(&text[s..end]);
    }

    paragraphs
}

/// Splits a paragraph after each `.`, `!` or `?` that is followed by
/// whitespace. Sentences come back trimmed; empty ones are dropped.
///
/// A paragraph without terminal punctuation is one sentence.
pub fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c.is_whitespace() && prev.is_some_and(is_sentence_terminal) {
            push_trimmed(&mut sentences, &paragraph[start..idx]);

            start = paragraph.len();
            while let Some(&(next_idx, next)) = chars.peek() {
                if !next.is_whitespace() {
                    start = next_idx;
                    break;
                }
                chars.next();
            }
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    push_trimmed(&mut sentences, &paragraph[start..]);
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("the quick  brown\tfox\n"), 4);
        assert_eq!(count_words("   padded   "), 1);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words(" \n\t "), 0);
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len("cat"), 3);
        assert_eq!(char_len("café"), 4);
        assert_eq!(char_len(""), 0);
    }

    #[test]
    fn test_sentence_terminals() {
        assert!(is_sentence_terminal('.'));
        assert!(is_sentence_terminal('!'));
        assert!(is_sentence_terminal('?'));
        assert!(!is_sentence_terminal(','));
        assert!(!is_sentence_terminal(';'));
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn test_collapse_blank_runs() {
        assert_eq!(collapse_blank_runs("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_runs("a\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_runs("a\nb"), "a\nb");
        assert_eq!(collapse_blank_runs("a\n\n\n"), "a\n\n");
    }

    #[test]
    fn test_collapse_inline_whitespace() {
        assert_eq!(collapse_inline_whitespace("Go\tnow."), "Go now.");
        assert_eq!(collapse_inline_whitespace("a  \t b"), "a b");
        assert_eq!(collapse_inline_whitespace("a\u{a0}b"), "a b");
        assert_eq!(collapse_inline_whitespace("end. \t\nnext"), "end.\nnext");
        assert_eq!(collapse_inline_whitespace("a\n \t\nb"), "a\n\nb");
        assert_eq!(collapse_inline_whitespace("plain"), "plain");
    }

    #[test]
    fn test_normalize_leaves_only_typeable_whitespace() {
        let text = normalize("\tHe said\t\thello. \r\n  She  left.\u{a0}\n\n\n Done. ");
        assert_eq!(text, "He said hello.\nShe left.\n\nDone.");
        assert!(text.chars().all(|c| !c.is_whitespace() || c == ' ' || c == '\n'));
        assert_eq!(count_words(&text), count_words("He said hello. She left. Done."));
    }

    #[test]
    fn test_normalize_trims_and_collapses() {
        assert_eq!(normalize("\r\n\r\n one\r\n\r\n\r\ntwo \n"), "one\n\ntwo");
        assert_eq!(normalize("   \n\n  "), "");
    }

    #[test]
    fn test_split_paragraphs() {
        assert_eq!(split_paragraphs("one\n\ntwo"), vec!["one", "two"]);
        assert_eq!(split_paragraphs("one\n  \t\ntwo"), vec!["one", "two"]);
        assert_eq!(split_paragraphs("line one\nline two"), vec!["line one\nline two"]);
        assert_eq!(split_paragraphs("\n\nonly\n\n"), vec!["only"]);
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs(" \n \n ").is_empty());
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("It rained. Did it stop?  No! Never"),
            vec!["It rained.", "Did it stop?", "No!", "Never"]
        );
    }

    #[test]
    fn test_split_sentences_keeps_inner_punctuation() {
        assert_eq!(
            split_sentences("Pi is 3.14 roughly. Mr.Smith agreed."),
            vec!["Pi is 3.14 roughly.", "Mr.Smith agreed."]
        );
    }

    #[test]
    fn test_split_sentences_without_terminals() {
        assert_eq!(
            split_sentences("no punctuation at all here"),
            vec!["no punctuation at all here"]
        );
    }

    #[test]
    fn test_split_sentences_degenerate() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
        assert_eq!(split_sentences("... !!! ???"), vec!["...", "!!!", "???"]);
    }

    #[test]
    fn test_split_sentences_across_soft_wrap() {
        assert_eq!(
            split_sentences("It ended.\nThen it began"),
            vec!["It ended.", "Then it began"]
        );
    }
}
