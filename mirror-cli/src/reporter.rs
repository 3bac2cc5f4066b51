//! Console rendering of sync events.
//!
//! On a terminal, `Processing` events drive a single status line that is
//! erased with backspaces before the next line is written. Elsewhere the
//! status line is suppressed so piped output stays clean.

use std::io::{IsTerminal, Write};

use mirror_core::{Reporter, SyncEvent};

/// Longest status line shown, in characters.
const STATUS_WIDTH: usize = 80;

/// Writes sync events as human-readable lines.
pub struct ConsoleReporter<W: Write> {
    out: W,
    show_status: bool,
    last_status: usize,
}

impl ConsoleReporter<std::io::Stdout> {
    /// Reporter on stdout, with a status line when stdout is a terminal.
    pub fn stdout() -> Self {
        let out = std::io::stdout();
        let show_status = out.is_terminal();
        Self::new(out, show_status)
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// Create a reporter writing to `out`.
    pub fn new(out: W, show_status: bool) -> Self {
        Self {
            out,
            show_status,
            last_status: 0,
        }
    }

    /// Consume the reporter and return the writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Backspace over the previous status line and blank it.
    fn erase(&self) -> String {
        let n = self.last_status;
        format!("{}{}{}", "\u{8}".repeat(n), " ".repeat(n), "\u{8}".repeat(n))
    }

    fn status(&mut self, text: &str) {
        let text: String = text.chars().take(STATUS_WIDTH).collect();
        let line = format!("{}{}", self.erase(), text);
        // Write errors are ignored: reporting never fails a run.
        let _ = self.out.write_all(line.as_bytes());
        let _ = self.out.flush();
        self.last_status = text.chars().count();
    }

    fn emit(&mut self, text: &str) {
        let line = format!("{}{}\n", self.erase(), text);
        let _ = self.out.write_all(line.as_bytes());
        let _ = self.out.flush();
        self.last_status = 0;
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Processing { name } => {
                if self.show_status {
                    self.status(&format!("Processing job '{name}'..."));
                }
            }
            SyncEvent::Discovered { name } => self.emit(&format!("Discovered new job '{name}'")),
            SyncEvent::Updated { name, diff } => {
                self.emit(&format!("Job '{name}' has been updated"));
                let body: Vec<String> = diff.iter().map(|line| format!("    {line}")).collect();
                self.emit(&body.join("\n"));
            }
            SyncEvent::Deleted { name } => self.emit(&format!("Job '{name}' has been deleted")),
            SyncEvent::Failed { name, message } => {
                self.emit(&format!("Job '{name}' could not be synced: {message}"))
            }
            SyncEvent::Done { .. } => self.emit("Done!"),
        }
    }
}
