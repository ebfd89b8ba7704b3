use console::style;
use std::io::Write;
use std::sync::Mutex;

/// Per-run console output.
///
/// Messages are rendered as SQL comments (`-- ` on every line) so that the
/// whole transcript of a run can be pasted next to the generated SQL. Dots
/// printed by [`RunReporter::dot`] leave the line open; the next message
/// starts on a fresh line.
pub struct RunReporter {
    verbose: bool,
    state: Mutex<ReporterState>,
}

struct ReporterState {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    mid_line: bool,
}

impl RunReporter {
    pub fn new(verbose: bool) -> Self {
        Self::with_writers(
            verbose,
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
        )
    }

    pub fn with_writers(
        verbose: bool,
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            verbose,
            state: Mutex::new(ReporterState {
                out,
                err,
                mid_line: false,
            }),
        }
    }

    pub fn log(&self, msg: &str) {
        self.write_out(&comment_lines(msg));
    }

    /// Only shown with `--verbose`
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{}", msg);
        if self.verbose {
            self.log(msg);
        } else {
            self.dot();
        }
    }

    /// Executed SQL, numbered so psql line numbers can be matched by eye
    pub fn log_sql(&self, sql: &str) {
        self.write_out(&number_lines(sql, 1));
    }

    pub fn error(&self, msg: &str) {
        let mut state = self.lock();
        let prefix = if state.mid_line { "\n" } else { "" };
        let _ = writeln!(state.err, "{}{}", prefix, style(msg).red());
        let _ = state.err.flush();
        state.mid_line = false;
    }

    /// Progress marker that does not end the line
    pub fn dot(&self) {
        let mut state = self.lock();
        let _ = write!(state.out, ".");
        let _ = state.out.flush();
        state.mid_line = true;
    }

    fn write_out(&self, text: &str) {
        let mut state = self.lock();
        let prefix = if state.mid_line { "\n" } else { "" };
        let _ = writeln!(state.out, "{}{}", prefix, text);
        let _ = state.out.flush();
        state.mid_line = false;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn comment_lines(msg: &str) -> String {
    msg.split('\n')
        .map(|line| format!("-- {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix every line with a `/*NNNNN*/ ` counter starting at `from_line`
pub fn number_lines(text: &str, from_line: usize) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| format!("/*{:05}*/ {}", i + from_line, line))
        .collect::<Vec<_>>()
        .join("\n")
}
