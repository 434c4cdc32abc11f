use ratatui::Frame;

use crate::{
    ui::{render_summary, render_typing},
    App, AppState,
};

/// A UI screen boundary: draws one application state.
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Active chunk, live stats and chapter progress.
pub struct TypingScreen;

impl Screen for TypingScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_typing(app, f.area(), f.buffer_mut());
    }
}

/// Shown once the chapter is done.
pub struct SummaryScreen;

impl Screen for SummaryScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_summary(app, f.area(), f.buffer_mut());
    }
}

pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Typing => Box::new(TypingScreen),
        AppState::Summary => Box::new(SummaryScreen),
    }
}
