pub mod charting;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, Gauge, GraphType, Paragraph, Widget, Wrap},
};
use tovel::typing::CharState;
use unicode_width::UnicodeWidthStr;

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

const PARAGRAPH_MARK: &str = " ¶";
const NEWLINE_MARK: &str = "↵";

fn bold_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold_style() -> Style {
    bold_style().add_modifier(Modifier::DIM)
}

fn shown(c: char) -> String {
    match c {
        '\n' => NEWLINE_MARK.to_owned(),
        c => c.to_string(),
    }
}

/// The active chunk, one span per char, styled by how it was typed.
fn chunk_spans(app: &App) -> Vec<Span<'static>> {
    let green_bold_style = bold_style().fg(Color::Green);
    let red_bold_style = bold_style().fg(Color::Red);
    let underlined_dim_bold_style = dim_bold_style().add_modifier(Modifier::UNDERLINED);
    let mark_style = Style::default().fg(Color::DarkGray);

    let session = app.reader.session();
    let chunk = app.reader.current_chunk();
    let typed: Vec<char> = session.input().chars().collect();

    let mut spans = Vec::with_capacity(chunk.text.len());
    for (idx, (expected, state)) in chunk.text.chars().zip(session.char_states()).enumerate() {
        spans.push(match state {
            CharState::Correct => Span::styled(shown(expected), green_bold_style),
            CharState::Incorrect => Span::styled(
                match typed.get(idx) {
                    Some(' ') => "·".to_owned(),
                    Some(&c) => shown(c),
                    None => shown(expected),
                },
                red_bold_style,
            ),
            CharState::Current => Span::styled(shown(expected), underlined_dim_bold_style),
            CharState::Pending => Span::styled(shown(expected), dim_bold_style()),
        });
        if chunk.paragraph_ends.contains(&(idx + 1)) {
            spans.push(Span::styled(PARAGRAPH_MARK, mark_style));
        }
    }
    spans
}

/// Rows reserved for text of `text_width` cells, with one spare row for
/// word wrapping once it spans more than a line.
fn text_lines(text_width: usize, area: Rect) -> u16 {
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    if text_width <= max_chars_per_line as usize {
        1
    } else {
        ((text_width as f64 / max_chars_per_line as f64).ceil() as u16 + 1).min(area.height)
    }
}

pub fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let reader = &app.reader;
    let session = reader.session();
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let spans = chunk_spans(app);
    let text_lines = text_lines(spans.iter().map(|s| s.content.width()).sum(), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(1), // position
            Constraint::Length(1), // chapter gauge
            Constraint::Min(0),
            Constraint::Length(text_lines),
            Constraint::Length(1), // padding
            Constraint::Length(1), // live stats
            Constraint::Length(1), // status
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(app.title.clone(), bold_style().fg(Color::Cyan)),
        Span::raw(format!(
            "   page {}/{}   chunk {}/{}",
            reader.current_page().number,
            reader.page_count(),
            reader.chunk_number(),
            reader.total_chunks()
        )),
    ]))
    .alignment(Alignment::Center);
    header.render(chunks[0], buf);

    let progress = reader.progress_percent().min(100);
    Gauge::default()
        .gauge_style(Style::default().fg(Color::Magenta))
        .percent(progress as u16)
        .label(format!("{progress}% of chapter"))
        .render(chunks[1], buf);

    let text = Paragraph::new(Line::from(spans))
        .alignment(if text_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true });
    text.render(chunks[3], buf);

    let stats = session.stats_at(app.now);
    let stats_line = Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {} correct   {} errors   {:.1}s",
            stats.wpm,
            stats.accuracy,
            stats.correct_chars,
            stats.incorrect_chars,
            stats.time_elapsed_secs
        ),
        bold_style(),
    ))
    .alignment(Alignment::Center);
    stats_line.render(chunks[5], buf);

    let status = if reader.is_finished() {
        Span::styled("chapter complete", bold_style().fg(Color::Green))
    } else if session.is_complete() {
        Span::styled(
            "chunk complete, the next one is on its way",
            Style::default().fg(Color::Green),
        )
    } else if !session.has_started() {
        Span::styled("start typing when ready", italic_style)
    } else {
        Span::raw("")
    };
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .render(chunks[6], buf);

    Paragraph::new(Span::styled(
        "(enter) newline / (ctrl+r) restart chunk / (esc)ape",
        italic_style,
    ))
    .render(chunks[8], buf);
}

pub fn render_summary(app: &App, area: Rect, buf: &mut Buffer) {
    let magenta_style = Style::default().fg(Color::Magenta);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(1),    // chart
            Constraint::Length(1), // this run
            Constraint::Length(1), // all runs
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!("chapter complete: {}", app.title),
        bold_style().fg(Color::Green),
    ))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    let history = app.reader.history();
    let points = charting::chunk_points(history);
    let (last_chunk, highest_wpm) = charting::compute_chart_params(&points);

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&points)];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("chunk")
                .bounds([1.0, last_chunk])
                .labels(vec![
                    Span::styled("1", bold_style()),
                    Span::styled(charting::format_label(last_chunk), bold_style()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold_style()),
                    Span::styled(charting::format_label(highest_wpm), bold_style()),
                ]),
        );
    chart.render(chunks[1], buf);

    let stats = app.reader.chapter_stats();
    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {} chunks   {:.0}s",
            stats.wpm,
            stats.accuracy,
            history.len(),
            stats.time_elapsed_secs
        ),
        bold_style(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let overall = match &app.stored_summary {
        Some(s) => format!(
            "all sessions: {}% of chapter, {:.0} wpm average, {} wpm best",
            s.progress_percent(),
            s.avg_wpm,
            s.best_wpm
        ),
        None => "progress was not saved".to_string(),
    };
    Paragraph::new(Span::styled(
        overall,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    Paragraph::new(Span::styled("(r)estart chapter / (q)uit", italic_style))
        .render(chunks[5], buf);
}
