use crate::core::generation::GenerationStatus;
use crate::core::watch_events::WatchEvent;
use crossterm::terminal;
use ratatui::{
    Frame, Terminal, TerminalOptions, Viewport,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, Paragraph},
};
use std::io::{self, Stdout};

/// What the watch screen shows for one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    generation_id: String,
    status: Option<GenerationStatus>,
    percentage: f64,
    message: Option<String>,
    output_url: Option<String>,
}

impl ProgressView {
    pub fn new(generation_id: impl Into<String>) -> Self {
        Self {
            generation_id: generation_id.into(),
            status: None,
            percentage: 0.0,
            message: None,
            output_url: None,
        }
    }

    pub fn apply(&mut self, event: &WatchEvent) {
        if self.is_finished() {
            return;
        }

        match event {
            WatchEvent::Progress(pct) => self.percentage = pct.clamp(0.0, 100.0),
            WatchEvent::Status(status) => self.status = Some(*status),
            WatchEvent::Completed { output_url } => {
                self.status = Some(GenerationStatus::Completed);
                self.percentage = 100.0;
                self.output_url = output_url.clone();
            }
            WatchEvent::Failed { message } => {
                self.status = Some(GenerationStatus::Failed);
                self.message = Some(message.clone());
            }
        }
    }

    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    pub fn status(&self) -> Option<GenerationStatus> {
        self.status
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn output_url(&self) -> Option<&str> {
        self.output_url.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }

    pub fn status_label(&self) -> &'static str {
        self.status.map_or("waiting", |s| s.as_str())
    }

    pub fn detail_line(&self) -> String {
        match (self.status, &self.message, &self.output_url) {
            (Some(GenerationStatus::Failed), Some(message), _) => format!("❌ {message}"),
            (Some(GenerationStatus::Completed), _, Some(url)) => format!("✅ {url}"),
            (Some(GenerationStatus::Completed), _, None) => "✅ Done".to_string(),
            _ => "Press Ctrl+C to stop watching".to_string(),
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Length(1)])
            .split(f.area());

        let color = match self.status {
            Some(GenerationStatus::Completed) => Color::Green,
            Some(GenerationStatus::Failed) => Color::Red,
            _ => Color::Cyan,
        };

        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("🖼  Generation {}", self.generation_id)),
            )
            .gauge_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .ratio(self.percentage / 100.0)
            .label(format!("{:.0}% · {}", self.percentage, self.status_label()));
        f.render_widget(gauge, chunks[0]);

        let detail = Paragraph::new(self.detail_line()).style(Style::default().fg(Color::Gray));
        f.render_widget(detail, chunks[1]);
    }
}

/// Draws a [`ProgressView`] in a few lines below the cursor, without taking over the screen.
pub struct InlineRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl InlineRenderer {
    pub const HEIGHT: u16 = 4;

    pub fn new() -> io::Result<Self> {
        // Fails early when stdout is not a terminal
        terminal::size()?;
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(Self::HEIGHT),
            },
        )?;
        Ok(Self { terminal })
    }

    pub fn draw(&mut self, view: &ProgressView) -> io::Result<()> {
        self.terminal.draw(|f| view.render(f))?;
        Ok(())
    }
}
