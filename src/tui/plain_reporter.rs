use crate::core::generation::GenerationStatus;
use crate::terminal::Terminal;
use crate::tui::ProgressView;
use std::io;

const STEP: f64 = 10.0;

/// Text output for pipes and CI logs: one line per status change or 10% step.
pub struct PlainReporter<T: Terminal> {
    terminal: T,
    last_status: Option<GenerationStatus>,
    last_step: Option<u8>,
}

impl<T: Terminal> PlainReporter<T> {
    pub fn new(terminal: T) -> Self {
        Self {
            terminal,
            last_status: None,
            last_step: None,
        }
    }

    pub fn report(&mut self, view: &ProgressView) -> io::Result<()> {
        let step = ((view.percentage() / STEP).floor() * STEP) as u8;
        let status_changed = view.status() != self.last_status;
        let step_changed = self.last_step != Some(step);

        if !status_changed && !step_changed {
            return Ok(());
        }

        self.terminal.write(&format!(
            "[{:>3}%] {} {}\n",
            step,
            view.generation_id(),
            view.status_label()
        ))?;
        self.terminal.flush()?;

        self.last_status = view.status();
        self.last_step = Some(step);
        Ok(())
    }

    pub fn into_inner(self) -> T {
        self.terminal
    }
}
