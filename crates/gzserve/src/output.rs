//! Styled terminal messages for the CLI.

use console::{Style, Term};

/// Writes startup and error messages to stderr.
pub(crate) struct Output {
    term: Term,
    warn: Style,
    fail: Style,
    banner: Style,
    gzip: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            warn: Style::new().yellow(),
            fail: Style::new().red().bold(),
            banner: Style::new().cyan().bold(),
            gzip: Style::new().green(),
        }
    }

    fn line(&self, msg: &str) {
        // Nothing sensible to do if stderr is gone
        let _ = self.term.write_line(msg);
    }

    pub(crate) fn info(&self, msg: &str) {
        self.line(msg);
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(&self.warn.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(&self.fail.apply_to(msg).to_string());
    }

    /// Print the listening address banner.
    pub(crate) fn highlight(&self, msg: &str) {
        self.line(&self.banner.apply_to(msg).to_string());
    }

    /// Print one mounted prefix and what it serves.
    pub(crate) fn mount(&self, prefix: &str, gzip: bool) {
        if gzip {
            let mode = self.gzip.apply_to("gzip variants when fresh");
            self.line(&format!("  {prefix}/ -> {mode}"));
        } else {
            self.line(&format!("  {prefix}/ -> raw files"));
        }
    }
}
