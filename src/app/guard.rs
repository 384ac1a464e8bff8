// ABOUTME: Scope guard that restores the terminal when the TUI loop ends
// Runs on return and when a panic unwinds past it; panics caught deeper down leave it untouched

/// Calls `restore` once, when dropped
pub struct TerminalGuard<F: FnMut()> {
    restore: Option<F>,
}

impl<F: FnMut()> TerminalGuard<F> {
    pub fn new(restore: F) -> Self {
        Self {
            restore: Some(restore),
        }
    }
}

impl<F: FnMut()> Drop for TerminalGuard<F> {
    fn drop(&mut self) {
        if let Some(mut restore) = self.restore.take() {
            restore();
        }
    }
}
