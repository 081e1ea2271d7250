//! Failure reporting.
//!
//! Every task failure ends up here, whether it stops a one-shot run or is
//! reported while watching.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Mutex;

/// Terminal bell.
const BELL: &str = "\x07";

/// Prints task failures to stderr and rings the terminal bell.
pub struct ErrorReporter {
    beep: bool,
    use_colors: bool,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("beep", &self.beep)
            .field("use_colors", &self.use_colors)
            .finish()
    }
}

impl ErrorReporter {
    /// Create a reporter on stderr, colored when stderr is a terminal.
    pub fn new(beep: bool) -> Self {
        Self {
            beep,
            use_colors: atty::is(atty::Stream::Stderr),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a reporter that writes to a custom output, without colors.
    pub fn with_output<W: Write + Send + 'static>(beep: bool, output: W) -> Self {
        Self { beep, use_colors: false, output: Mutex::new(Box::new(output)) }
    }

    /// The lines printed for a failure.
    pub fn format(&self, task: &str, message: &str) -> String {
        let headline = format!("Task Failed [{}: {}]", task, message);
        let headline =
            if self.use_colors { format!("\x1b[1;31m{}\x1b[0m", headline) } else { headline };
        let bell = if self.beep { BELL } else { "" };
        format!("{}\n{}See console.\n", headline, bell)
    }

    /// Report a failure and keep going.
    pub fn report(&self, task: &str, message: &str) {
        tracing::error!(task, "{}", message);
        if let Ok(mut output) = self.output.lock() {
            let _ = output.write_all(self.format(task, message).as_bytes());
            let _ = output.flush();
        }
    }

    /// Report a failure that ends the run.
    pub fn fail(&self, task: &str, message: &str) -> ExitCode {
        self.report(task, message);
        ExitCode::FAILURE
    }
}
