//! jobterm REPL: interactive front end for a jobterm Session.
//!
//! The REPL handles:
//! - Meta-commands: `/help`, `/quit`, `/search TERM`, `/cwd`, `/bg`
//! - Everything else goes to [`Session::dispatch`]
//! - Line editing and recall via rustyline, seeded from the session history
//! - Forwarding terminal SIGINT/SIGTSTP to the session as gestures
//!
//! Commands run in their own process groups, so terminal gestures reach
//! only this process. The handlers installed here just raise the session's
//! [`JobControls`] flags; the session delivers the real signal.

use std::ffi::c_int;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use jobterm_kernel::history::HISTORY_WINDOW;
use jobterm_kernel::{Dispatch, DisplaySink, JobControls, Session, SessionConfig};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Display sink that prints each line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn append_line(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// What the line loop should do after a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Keep reading, printing any meta-command output first.
    Continue(Option<String>),
    /// Keep reading, with the next line pre-filled.
    Prefill(String),
    /// Leave the REPL.
    Exit,
}

/// REPL state: one session.
pub struct Repl {
    session: Session,
}

impl Repl {
    /// REPL over a session in the current directory, printing to stdout.
    pub fn new() -> Result<Self> {
        let config = SessionConfig::load().context("Failed to load jobterm config")?;
        Ok(Self::with_session(Session::local(config, StdoutSink)))
    }

    pub fn with_session(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Prompt showing the session directory.
    pub fn prompt(&self) -> String {
        format!("jobterm:{}> ", self.session.working_directory().display())
    }

    /// Process a single line of input.
    pub fn process_line(&mut self, line: &str) -> Step {
        let trimmed = line.trim();
        if trimmed.starts_with('/') && !trimmed.starts_with("//") {
            if let Some(step) = self.handle_meta_command(trimmed) {
                return step;
            }
        }

        match self.session.dispatch(line) {
            Dispatch::Continue => Step::Continue(None),
            Dispatch::Exit => Step::Exit,
        }
    }

    /// Handle a meta-command. `None` means the line is an ordinary command
    /// that happens to start with `/` (such as `/bin/ls`).
    fn handle_meta_command(&mut self, cmd: &str) -> Option<Step> {
        let (command, rest) = match cmd.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (cmd, ""),
        };

        let step = match command {
            "/quit" | "/q" => Step::Exit,
            "/help" | "/h" | "/?" => Step::Continue(Some(HELP_TEXT.trim_end().to_string())),
            "/search" => {
                if rest.is_empty() {
                    return Some(Step::Continue(Some("Usage: /search TERM".to_string())));
                }
                match self.session.search_history(rest) {
                    Some(found) => Step::Prefill(found),
                    None => Step::Continue(None),
                }
            }
            "/cwd" => Step::Continue(Some(
                self.session.working_directory().display().to_string(),
            )),
            "/bg" => {
                let jobs = self.session.background_jobs();
                if jobs.is_empty() {
                    Step::Continue(Some("(no background jobs)".to_string()))
                } else {
                    let mut output = String::from("Background jobs:");
                    for job in jobs {
                        output.push_str(&format!("\n  [{}] {} {}", job.index, job.pid, job.command));
                    }
                    Step::Continue(Some(output))
                }
            }
            _ => return None,
        };
        Some(step)
    }
}

const HELP_TEXT: &str = r#"jobterm REPL

Meta Commands:
  /help, /?         Show this help
  /quit, /q         Exit the REPL
  /search TERM      Find TERM in history and pre-fill the next line
  /cwd              Show the session directory
  /bg               List background jobs

Builtins:
  cd [path]         Change directory ($HOME without a path)
  history           Show the last 1000 commands
  jobs              List suspended jobs
  fg                Resume the most recently suspended job
  exit              Close the session
  multiWatch ["cmd1", "cmd2", ...]
                    Run commands in parallel, tailing their output

Everything else runs through the system shell:
  a | b | c         Pipeline
  cmd < in > out    Redirection (single command only)
  cmd &             Run in background

Keys while a command runs:
  Ctrl-C            Interrupt the command
  Ctrl-Z            Suspend the command (resume with fg)
"#;

static CONTROLS: OnceLock<JobControls> = OnceLock::new();

extern "C" fn on_interrupt(_: c_int) {
    if let Some(controls) = CONTROLS.get() {
        controls.request_interrupt();
    }
}

extern "C" fn on_suspend(_: c_int) {
    if let Some(controls) = CONTROLS.get() {
        controls.request_suspend();
    }
}

/// Route SIGINT and SIGTSTP to `controls` for the life of the process.
pub fn install_signal_handlers(controls: JobControls) -> Result<()> {
    if CONTROLS.set(controls).is_err() {
        tracing::debug!("signal handlers already installed");
        return Ok(());
    }
    for (signal, handler) in [
        (Signal::SIGINT, on_interrupt as extern "C" fn(c_int)),
        (Signal::SIGTSTP, on_suspend as extern "C" fn(c_int)),
    ] {
        let action = SigAction::new(SigHandler::Handler(handler), SaFlags::SA_RESTART, SigSet::empty());
        // SAFETY: the handlers only store to atomics.
        unsafe { sigaction(signal, &action) }
            .with_context(|| format!("Failed to install {} handler", signal))?;
    }
    Ok(())
}

/// Run the interactive REPL.
pub fn run() -> Result<()> {
    println!("jobterm v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.");
    println!();

    let mut repl = Repl::new()?;
    install_signal_handlers(repl.session().controls())?;

    let mut rl = DefaultEditor::new().context("Failed to create editor")?;
    let past = repl.session().history().list_all();
    for line in past.iter().skip(past.len().saturating_sub(HISTORY_WINDOW)) {
        if let Err(e) = rl.add_history_entry(line.as_str()) {
            tracing::warn!("Failed to seed history: {}", e);
        }
    }

    let mut prefill: Option<String> = None;
    loop {
        repl.session_mut().tick_background_reap();
        let prompt = repl.prompt();

        let read = match prefill.take() {
            Some(initial) => rl.readline_with_initial(&prompt, (&initial, "")),
            None => rl.readline(&prompt),
        };

        match read {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = rl.add_history_entry(line.as_str()) {
                        tracing::warn!("Failed to add history entry: {}", e);
                    }
                }
                match repl.process_line(&line) {
                    Step::Continue(Some(output)) => println!("{}", output),
                    Step::Continue(None) => {}
                    Step::Prefill(line) => prefill = Some(line),
                    Step::Exit => break,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    repl.session_mut().shutdown();
    Ok(())
}

/// Dispatch one line on a fresh session and shut it down.
pub fn run_command(cmd: &str) -> Result<()> {
    let mut repl = Repl::new()?;
    install_signal_handlers(repl.session().controls())?;
    repl.process_line(cmd);
    repl.session_mut().shutdown();
    Ok(())
}
