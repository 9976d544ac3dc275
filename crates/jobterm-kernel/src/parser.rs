//! Command-line classifier.
//!
//! Turns one dispatched line into a [`Request`]: a builtin, a multiWatch
//! command set, or a [`Pipeline`] for the execution engine. Shell grammar
//! (quoting, globbing, expansion) is left to the delegated interpreter; this
//! parser only finds builtins, the trailing `&`, top-level `|`, and the
//! single-stage `<` / `>` redirection targets.
//!
//! Parsing never spawns anything. Malformed input yields a [`ParseError`]
//! whose text is the diagnostic to show.

use std::path::PathBuf;

use crate::error::ParseError;

/// Most stages a pipeline may have; extra stages are dropped.
pub const MAX_STAGES: usize = 64;

/// Most commands a multiWatch set may have; extra commands are dropped.
pub const MAX_WATCH_COMMANDS: usize = 64;

/// A classified command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Blank line.
    Empty,
    /// `history`
    History,
    /// `cd [path]`
    Cd(Option<String>),
    /// `fg`
    Fg,
    /// `jobs`
    Jobs,
    /// `multiWatch [...]` with its parsed command list.
    MultiWatch(Vec<String>),
    /// `exit`
    Exit,
    /// Anything else.
    Run(Pipeline),
}

/// One command within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Opaque text handed to the interpreter.
    pub command: String,
    /// `< file` target.
    pub input: Option<PathBuf>,
    /// `> file` target.
    pub output: Option<PathBuf>,
}

impl Stage {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            input: None,
            output: None,
        }
    }
}

/// Ordered, non-empty sequence of stages.
///
/// Only a single-stage pipeline can carry redirection targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub background: bool,
    /// The dispatched line, verbatim.
    pub text: String,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Classify one command line.
pub fn parse(line: &str) -> Result<Request, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Request::Empty);
    }

    if let Some(request) = parse_builtin(trimmed)? {
        return Ok(request);
    }

    let (body, background) = strip_background(trimmed);

    let stages = if body.contains('|') {
        split_stages(body)
    } else {
        match parse_redirections(body)? {
            Some(stage) => vec![stage],
            None => Vec::new(),
        }
    };

    if stages.is_empty() {
        return Ok(Request::Empty);
    }

    Ok(Request::Run(Pipeline {
        stages,
        background,
        text: line.to_string(),
    }))
}

/// Recognize builtin literals ahead of generic parsing.
fn parse_builtin(line: &str) -> Result<Option<Request>, ParseError> {
    let request = match line {
        "history" => Request::History,
        "fg" => Request::Fg,
        "jobs" => Request::Jobs,
        "exit" => Request::Exit,
        "cd" => Request::Cd(None),
        _ => {
            if let Some(rest) = line.strip_prefix("cd ") {
                let path = rest.trim_start_matches(' ');
                Request::Cd((!path.is_empty()).then(|| path.to_string()))
            } else if let Some(args) = line.strip_prefix("multiWatch") {
                Request::MultiWatch(parse_watch_list(args.trim_start_matches(' '))?)
            } else {
                return Ok(None);
            }
        }
    };
    Ok(Some(request))
}

/// Strip a trailing unescaped `&`, returning the remaining text and whether
/// it was present.
fn strip_background(line: &str) -> (&str, bool) {
    let body = line.trim_end_matches([' ', '\t']);
    match body.strip_suffix('&') {
        Some(rest) if !rest.is_empty() && !rest.ends_with('\\') => {
            (rest.trim_end_matches([' ', '\t']), true)
        }
        _ => (body, false),
    }
}

/// Split on every `|`, dropping empty pieces, capped at [`MAX_STAGES`].
fn split_stages(body: &str) -> Vec<Stage> {
    body.split('|')
        .map(|s| s.trim_matches([' ', '\t', '\n']))
        .filter(|s| !s.is_empty())
        .take(MAX_STAGES)
        .map(Stage::new)
        .collect()
}

/// Pull `< in` and `> out` targets out of a single-stage command.
///
/// The first `<` and the first `>` are found independently. Each target runs
/// from its operator to the other operator (if that comes later) or to the
/// end of the line. The command is whatever precedes both.
fn parse_redirections(body: &str) -> Result<Option<Stage>, ParseError> {
    let lt = body.find('<');
    let gt = body.find('>');

    let target = |op: Option<usize>, other: Option<usize>| {
        op.map(|at| {
            let end = match other {
                Some(o) if o > at => o,
                _ => body.len(),
            };
            PathBuf::from(body[at + 1..end].trim_matches([' ', '\n', '\r']))
        })
    };

    let input = target(lt, gt);
    let output = target(gt, lt);

    let cmd_end = [lt, gt].into_iter().flatten().min().unwrap_or(body.len());
    let command = body[..cmd_end].trim_matches([' ', '\n', '\r']);

    if command.is_empty() {
        if input.is_some() || output.is_some() {
            return Err(ParseError::RedirectWithoutCommand);
        }
        return Ok(None);
    }

    Ok(Some(Stage {
        command: command.to_string(),
        input,
        output,
    }))
}

/// Parse a multiWatch argument: `[ "cmd one", cmd two, "say \"hi\"" ]`.
///
/// Items are separated by commas. A quoted item runs to the next unescaped
/// `"`; `\"` and `\\` inside quotes stand for `"` and `\`. A bare item runs
/// to the next `,` or `]` and is trimmed. At most [`MAX_WATCH_COMMANDS`]
/// items are kept.
pub fn parse_watch_list(args: &str) -> Result<Vec<String>, ParseError> {
    let open = args.find('[').ok_or(ParseError::MalformedWatchList)?;
    let mut chars = args[open + 1..].chars().peekable();
    let mut commands = Vec::new();
    let mut closed = false;

    while commands.len() < MAX_WATCH_COMMANDS {
        while matches!(chars.peek(), Some(' ' | '\t' | ',')) {
            chars.next();
        }

        match chars.peek() {
            None => break,
            Some(']') => {
                closed = true;
                break;
            }
            Some('"') => {
                chars.next();
                let mut item = String::new();
                while let Some(ch) = chars.next() {
                    match ch {
                        '"' => break,
                        '\\' => match chars.peek() {
                            Some(&next @ ('"' | '\\')) => {
                                item.push(next);
                                chars.next();
                            }
                            _ => item.push('\\'),
                        },
                        _ => item.push(ch),
                    }
                }
                commands.push(item);
            }
            Some(_) => {
                let mut item = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == ',' || ch == ']' {
                        break;
                    }
                    item.push(ch);
                    chars.next();
                }
                commands.push(item.trim_matches([' ', '\t', '\n', '\r']).to_string());
            }
        }
    }

    // Capped lists need not be closed: everything past the cap is dropped.
    if !closed && commands.len() < MAX_WATCH_COMMANDS {
        return Err(ParseError::NoWatchCommands);
    }
    commands.retain(|c| !c.is_empty());
    if commands.is_empty() {
        return Err(ParseError::NoWatchCommands);
    }
    Ok(commands)
}
