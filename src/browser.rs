use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::{ApprovalSurface, PopupHandle, PopupSize};

/// Opens the authorization URL in the system browser.
///
/// A browser tab cannot be observed from here, so the surface counts as closed
/// once the user presses Enter on stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSurface;

struct ConfirmedOnStdin {
    closed: Arc<AtomicBool>,
}

impl PopupHandle for ConfirmedOnStdin {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ApprovalSurface for BrowserSurface {
    fn open(&self, url: &str, title: &str, _size: PopupSize) -> Option<Box<dyn PopupHandle>> {
        eprintln!("{title}:\n{url}");
        if let Err(err) = webbrowser::open(url) {
            tracing::warn!(error = %err, "failed to open browser");
            return None;
        }
        eprintln!("Press Enter once you have approved access in the browser.");

        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();
        thread::spawn(move || await_confirmation(std::io::stdin().lock(), &flag));

        Some(Box::new(ConfirmedOnStdin { closed }))
    }
}

/// Blocks until a line (or EOF) arrives on `reader`, then marks the window closed.
/// A read error also counts as closed so polling cannot hang.
fn await_confirmation(mut reader: impl BufRead, closed: &AtomicBool) {
    let mut line = String::new();
    if let Err(err) = reader.read_line(&mut line) {
        tracing::warn!(error = %err, "failed to read confirmation from stdin");
    }
    closed.store(true, Ordering::SeqCst);
}
