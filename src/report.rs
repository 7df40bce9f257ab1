// src/report.rs

//! Operator-facing output and confirmation prompts
//!
//! Components never print directly. They receive a [`Reporter`] at
//! construction and send console output, failures and yes/no questions
//! through it:
//! - `ConsoleReporter`: ` => message` lines on stdout, prompts on stdin
//! - `MemoryReporter`: records everything and answers prompts from a script
//!   (tests and the `test-utils` feature only)

use crate::error::Result;
use std::io::{self, BufRead, IsTerminal, Write};
#[cfg(any(test, feature = "test-utils"))]
use std::collections::VecDeque;
#[cfg(any(test, feature = "test-utils"))]
use std::sync::Mutex;
use tracing::debug;

/// Sink for console output and confirmations
pub trait Reporter: Send + Sync {
    /// Normal progress output
    fn output(&self, message: &str);

    /// A bare listing line (search results, query output)
    fn print(&self, line: &str);

    /// A failure the operator must see
    fn error(&self, message: &str);

    /// A non-fatal problem
    fn warn(&self, message: &str);

    /// Ask a yes/no question about `items`
    ///
    /// Returns the answer. When confirmations are disabled the default is
    /// taken without asking.
    fn confirm(&self, message: &str, items: &[String], default_yes: bool) -> Result<bool>;
}

/// Reporter writing to the terminal
pub struct ConsoleReporter {
    /// Ask questions (false with `--no-confirm`)
    interactive: bool,
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            quiet: false,
        }
    }

    /// Suppress `output` lines (errors and prompts still shown)
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Whether stdin can answer prompts at all
    pub fn stdin_is_terminal() -> bool {
        io::stdin().is_terminal()
    }
}

impl Reporter for ConsoleReporter {
    fn output(&self, message: &str) {
        if !self.quiet {
            println!(" => {}", message);
        }
    }

    fn print(&self, line: &str) {
        println!("{}", line);
    }

    fn error(&self, message: &str) {
        eprintln!("FAILURE => {}", message);
    }

    fn warn(&self, message: &str) {
        eprintln!("WARNING => {}", message);
    }

    fn confirm(&self, message: &str, items: &[String], default_yes: bool) -> Result<bool> {
        if !self.interactive {
            debug!("no confirmation requested, taking default for '{}'", message);
            return Ok(default_yes);
        }

        let mut stdout = io::stdout();
        writeln!(stdout)?;
        for item in items {
            writeln!(stdout, "  -> {}", item)?;
        }
        writeln!(stdout)?;
        let choices = if default_yes { "Y/n" } else { "y/N" };
        write!(stdout, " ===> {}, ({})? ", message, choices)?;
        stdout.flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;

        Ok(parse_answer(&input, default_yes))
    }
}

/// Interpret a prompt answer
///
/// Only an explicit "n" declines a default-yes question and only an explicit
/// "y" accepts a default-no question.
pub fn parse_answer(input: &str, default_yes: bool) -> bool {
    let answer = input.trim().to_lowercase();
    if default_yes {
        !matches!(answer.as_str(), "n" | "no")
    } else {
        matches!(answer.as_str(), "y" | "yes")
    }
}

/// A prompt seen by [`MemoryReporter`]
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub message: String,
    pub items: Vec<String>,
    pub default_yes: bool,
}

/// Reporter that records everything
///
/// Prompts are answered from a queue of scripted answers; once the queue is
/// empty the prompt's default is used.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MemoryReporter {
    outputs: Mutex<Vec<String>>,
    printed: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    prompts: Mutex<Vec<Prompt>>,
    answers: Mutex<VecDeque<bool>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for upcoming prompts
    pub fn with_answers(answers: &[bool]) -> Self {
        let reporter = Self::default();
        if let Ok(mut queue) = reporter.answers.lock() {
            queue.extend(answers.iter().copied());
        }
        reporter
    }

    pub fn outputs(&self) -> Vec<String> {
        self.outputs.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn printed(&self) -> Vec<String> {
        self.printed.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Reporter for MemoryReporter {
    fn output(&self, message: &str) {
        if let Ok(mut v) = self.outputs.lock() {
            v.push(message.to_string());
        }
    }

    fn print(&self, line: &str) {
        if let Ok(mut v) = self.printed.lock() {
            v.push(line.to_string());
        }
    }

    fn error(&self, message: &str) {
        if let Ok(mut v) = self.errors.lock() {
            v.push(message.to_string());
        }
    }

    fn warn(&self, message: &str) {
        if let Ok(mut v) = self.warnings.lock() {
            v.push(message.to_string());
        }
    }

    fn confirm(&self, message: &str, items: &[String], default_yes: bool) -> Result<bool> {
        if let Ok(mut v) = self.prompts.lock() {
            v.push(Prompt {
                message: message.to_string(),
                items: items.to_vec(),
                default_yes,
            });
        }
        let scripted = self.answers.lock().ok().and_then(|mut q| q.pop_front());
        Ok(scripted.unwrap_or(default_yes))
    }
}
