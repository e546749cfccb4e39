use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::debug;

use crate::ports::StatusView;

/// Latest values shown on the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub status: String,
    pub display: String,
}

/// Status view writing to a terminal.
pub struct TerminalView<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
    last: Mutex<ViewSnapshot>,
}

impl TerminalView {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            last: Mutex::new(ViewSnapshot {
                status: String::new(),
                display: "00:00".to_string(),
            }),
        }
    }

    /// Current status text and display.
    pub fn snapshot(&self) -> ViewSnapshot {
        self.last.lock().clone()
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl<W: Write + Send> StatusView for TerminalView<W> {
    fn show_status(&self, text: &str) {
        debug!(status = text, "Status updated");
        self.last.lock().status = text.to_string();
        self.write_line(&format!("[status] {}", text));
    }

    fn show_time(&self, label: &str) {
        self.last.lock().display = label.to_string();
        self.write_line(&format!("[timer]  {}", label));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_and_remembers() {
        let view = TerminalView::new(Vec::new());
        view.show_status("Ready to start timer");
        view.show_time("01:05");

        assert_eq!(
            view.snapshot(),
            ViewSnapshot {
                status: "Ready to start timer".to_string(),
                display: "01:05".to_string(),
            }
        );

        let written = String::from_utf8(view.out.lock().clone()).unwrap();
        assert_eq!(written, "[status] Ready to start timer\n[timer]  01:05\n");
    }
}
