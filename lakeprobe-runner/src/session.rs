//! Interactive query session.
//!
//! A synchronous read-query-print loop over the resolved bindings. One line
//! is read per iteration; control commands (`exit`, `quit`, `help`, empty
//! input) never reach the engine. Query failures are printed and the loop
//! keeps going. An interrupt ends the loop at the next loop boundary.
//!
//! State transitions:
//!
//! ```text
//! AwaitingInput --query--> Executing --done/failed--> AwaitingInput
//! AwaitingInput --exit/quit/EOF/interrupt--> Terminated
//! Executing --interrupt flag--> Terminated
//! ```
//!
//! `Terminated` is absorbing.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lakeprobe_core::{
    run_query, BindingSet, QueryExecutor, QueryOutcome, MARKET_DATASET, NEWS_DATASET,
};
use tracing::{debug, info};

use crate::render::{render_bindings, render_outcome};

pub const PROMPT: &str = "lakeprobe> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Executing,
    Terminated(Termination),
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `exit` or `quit`.
    Command,
    /// Interrupt during input or execution.
    Interrupt,
    /// The input source was exhausted.
    EndOfInput,
}

/// One read from a [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Interrupted,
    Eof,
}

/// Where session input comes from. The binary uses a line editor; tests use
/// [`ScriptedLines`].
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Input;

    /// Record an accepted line (history).
    fn remember(&mut self, _line: &str) {}
}

/// Canned input, then [`Input::Eof`].
#[derive(Debug, Default)]
pub struct ScriptedLines {
    lines: std::collections::VecDeque<Input>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(|l| Input::Line(l.into())).collect(),
        }
    }

    pub fn then_interrupt(mut self) -> Self {
        self.lines.push_back(Input::Interrupted);
        self
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self, _prompt: &str) -> Input {
        self.lines.pop_front().unwrap_or(Input::Eof)
    }
}

/// A line classified before anything runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    Empty,
    Query(String),
}

/// Trim the line and strip one trailing `;`; control words are case-insensitive.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "exit" | "quit" => Command::Exit,
        "help" => Command::Help,
        _ => Command::Query(trimmed.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub executed: usize,
    pub failed: usize,
    pub termination: Termination,
}

pub struct Session<'a> {
    executor: &'a mut dyn QueryExecutor,
    bindings: &'a BindingSet,
    interrupt: Arc<AtomicBool>,
    state: SessionState,
    executed: usize,
    failed: usize,
}

impl<'a> Session<'a> {
    pub fn new(executor: &'a mut dyn QueryExecutor, bindings: &'a BindingSet) -> Self {
        Self {
            executor,
            bindings,
            interrupt: Arc::new(AtomicBool::new(false)),
            state: SessionState::AwaitingInput,
            executed: 0,
            failed: 0,
        }
    }

    /// Share an interrupt flag set from a signal handler.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply one input. Does nothing once terminated.
    pub fn step(&mut self, input: Input, out: &mut dyn Write) -> io::Result<()> {
        if self.state != SessionState::AwaitingInput {
            return Ok(());
        }

        let line = match input {
            Input::Line(line) => line,
            Input::Interrupted => {
                self.state = SessionState::Terminated(Termination::Interrupt);
                return Ok(());
            }
            Input::Eof => {
                self.state = SessionState::Terminated(Termination::EndOfInput);
                return Ok(());
            }
        };

        match parse_command(&line) {
            Command::Empty => {}
            Command::Exit => self.state = SessionState::Terminated(Termination::Command),
            Command::Help => out.write_all(self.help().as_bytes())?,
            Command::Query(sql) => {
                self.state = SessionState::Executing;
                let outcome = run_query(self.executor, &sql);
                self.executed += 1;
                if outcome.is_failed() {
                    self.failed += 1;
                }
                debug!(executed = self.executed, failed = outcome.is_failed(), "session query done");
                out.write_all(render_outcome(&outcome).as_bytes())?;
                if let QueryOutcome::Rows(result) = &outcome {
                    writeln!(out, "({} rows)", result.row_count())?;
                }
                self.state = SessionState::AwaitingInput;
            }
        }

        if self.interrupt.swap(false, Ordering::SeqCst)
            && self.state == SessionState::AwaitingInput
        {
            self.state = SessionState::Terminated(Termination::Interrupt);
        }
        Ok(())
    }

    /// Read and apply lines until the session terminates.
    pub fn run(
        &mut self,
        source: &mut dyn LineSource,
        out: &mut dyn Write,
    ) -> io::Result<SessionSummary> {
        writeln!(out, "Interactive query mode. Available datasets:")?;
        out.write_all(render_bindings(self.bindings).as_bytes())?;
        writeln!(out, "Type 'help' for examples, 'exit' or 'quit' to leave.")?;

        loop {
            if let SessionState::Terminated(termination) = self.state {
                info!(executed = self.executed, failed = self.failed, ?termination, "session ended");
                return Ok(SessionSummary {
                    executed: self.executed,
                    failed: self.failed,
                    termination,
                });
            }
            if self.interrupt.swap(false, Ordering::SeqCst) {
                self.state = SessionState::Terminated(Termination::Interrupt);
                continue;
            }

            let input = source.read_line(PROMPT);
            if let Input::Line(line) = &input {
                if !line.trim().is_empty() {
                    source.remember(line);
                }
            }
            self.step(input, out)?;
            out.flush()?;
        }
    }

    /// Example queries built from the current bindings.
    pub fn help(&self) -> String {
        let mut out = String::from("Example queries:\n");
        if self.bindings.is_empty() {
            out.push_str("  (no datasets resolved; query a path directly)\n");
            out.push_str("  SELECT * FROM 's3://bucket/table/**/*.parquet' LIMIT 10\n");
            return out;
        }
        for binding in self.bindings.iter() {
            let rel = self.executor.relation(&binding.pattern);
            out.push_str(&format!("  -- {}\n", binding.dataset));
            out.push_str(&format!("  SELECT * FROM {} LIMIT 1\n", binding.dataset));
            out.push_str(&format!("  SELECT COUNT(*) AS n FROM {rel}\n"));
        }
        if self.bindings.contains(NEWS_DATASET) {
            out.push_str("  -- sentiment breakdown\n");
            out.push_str(&format!(
                "  SELECT sentiment_category, COUNT(*) AS n FROM {NEWS_DATASET} \
                 GROUP BY sentiment_category ORDER BY n DESC\n"
            ));
        }
        if self.bindings.contains(MARKET_DATASET) {
            out.push_str("  -- average price by hour of day\n");
            out.push_str(&format!(
                "  SELECT EXTRACT(HOUR FROM \"timestamp\") AS hour, AVG(price) AS avg_price \
                 FROM {MARKET_DATASET} GROUP BY hour ORDER BY hour\n"
            ));
        }
        out
    }
}
