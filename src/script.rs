//! Command language for driving a memory manager
//!
//! One command per line. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! alloc <id> <size>
//! alloc <size>
//! free <id>
//! write <id> <offset> <text>
//! read <id> <offset> <length>
//! defrag
//! show
//! stats
//! blocks
//! ```
//!
//! For `write`, everything after the single separator following `<offset>`
//! is the payload, spaces included.

use anyhow::Context;
use thiserror::Error;
use tracing::debug;

use crate::memory::{BlockId, MemoryManager, MemoryResult};

/// One parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Allocate; `id: None` picks the next numeric id
    Alloc { id: Option<BlockId>, size: usize },
    Free { id: BlockId },
    Write { id: BlockId, offset: usize, text: String },
    Read { id: BlockId, offset: usize, length: usize },
    Defrag,
    Show,
    Stats,
    Blocks,
}

/// Command parse error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("usage: {usage}")]
    Usage { usage: &'static str },

    #[error("{field} must be a non-negative integer, got '{value}'")]
    BadNumber { field: &'static str, value: String },
}

/// Parse error tagged with its 1-based line number
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}: {error}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub error: ParseError,
}

const ALLOC_USAGE: &str = "alloc [<id>] <size>";
const FREE_USAGE: &str = "free <id>";
const WRITE_USAGE: &str = "write <id> <offset> <text>";
const READ_USAGE: &str = "read <id> <offset> <length>";

/// Split off the next whitespace-delimited token
fn next_token<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let trimmed = rest.trim_start();
    if trimmed.is_empty() {
        *rest = trimmed;
        return None;
    }
    let end = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());
    let (token, tail) = trimmed.split_at(end);
    *rest = tail;
    Some(token)
}

fn number(
    field: &'static str,
    token: Option<&str>,
    usage: &'static str,
) -> Result<usize, ParseError> {
    let token = token.ok_or(ParseError::Usage { usage })?;
    token.parse().map_err(|_| ParseError::BadNumber {
        field,
        value: token.to_string(),
    })
}

fn block_id(
    token: Option<&str>,
    usage: &'static str,
) -> Result<BlockId, ParseError> {
    token.map(BlockId::from).ok_or(ParseError::Usage { usage })
}

fn finish(
    rest: &str,
    usage: &'static str,
) -> Result<(), ParseError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(ParseError::Usage { usage })
    }
}

/// Parse one line; `Ok(None)` for blank and comment lines
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }

    let mut rest = line;
    let Some(name) = next_token(&mut rest) else {
        return Ok(None);
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "alloc" | "allocate" => {
            let first = next_token(&mut rest);
            let second = next_token(&mut rest);
            finish(rest, ALLOC_USAGE)?;
            match second {
                Some(size) => Command::Alloc {
                    id: Some(block_id(first, ALLOC_USAGE)?),
                    size: number("size", Some(size), ALLOC_USAGE)?,
                },
                None => Command::Alloc {
                    id: None,
                    size: number("size", first, ALLOC_USAGE)?,
                },
            }
        }
        "free" => {
            let id = block_id(next_token(&mut rest), FREE_USAGE)?;
            finish(rest, FREE_USAGE)?;
            Command::Free { id }
        }
        "write" => {
            let id = block_id(next_token(&mut rest), WRITE_USAGE)?;
            let offset = number("offset", next_token(&mut rest), WRITE_USAGE)?;
            // drop the one separator; the payload keeps any further spaces
            let mut chars = rest.chars();
            chars.next();
            Command::Write {
                id,
                offset,
                text: chars.as_str().to_string(),
            }
        }
        "read" => {
            let id = block_id(next_token(&mut rest), READ_USAGE)?;
            let offset = number("offset", next_token(&mut rest), READ_USAGE)?;
            let length = number("length", next_token(&mut rest), READ_USAGE)?;
            finish(rest, READ_USAGE)?;
            Command::Read { id, offset, length }
        }
        "defrag" | "defragment" => Command::Defrag,
        "show" => Command::Show,
        "stats" => Command::Stats,
        "blocks" => Command::Blocks,
        _ => return Err(ParseError::UnknownCommand(name.to_string())),
    };

    if matches!(
        command,
        Command::Defrag | Command::Show | Command::Stats | Command::Blocks
    ) && !rest.trim().is_empty()
    {
        return Err(ParseError::Usage {
            usage: "defrag | show | stats | blocks (no arguments)",
        });
    }

    Ok(Some(command))
}

/// Turn `;`-separated commands into one command per line
///
/// A `;` ends a command only when followed by whitespace or the end of the
/// input, so `write a 0 x;y` keeps `x;y` as its payload.
pub fn split_commands(code: &str) -> String {
    let mut lines = String::with_capacity(code.len());
    let mut chars = code.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ';' && chars.peek().is_none_or(|next| next.is_whitespace()) {
            lines.push('\n');
        } else {
            lines.push(c);
        }
    }
    lines
}

/// A parsed script: commands with their line numbers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    commands: Vec<(usize, Command)>,
}

impl Script {
    /// Parse every line, failing on the first malformed one
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut commands = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let parsed = parse_line(line).map_err(|error| ScriptError {
                line: index + 1,
                error,
            })?;
            if let Some(command) = parsed {
                commands.push((index + 1, command));
            }
        }
        Ok(Self { commands })
    }

    /// Commands with their 1-based line numbers
    pub fn commands(&self) -> &[(usize, Command)] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Execute in order, handing each output to `sink`.
    ///
    /// Stops at the first failing command.
    pub fn execute<F>(
        &self,
        memory: &MemoryManager,
        mut sink: F,
    ) -> anyhow::Result<()>
    where
        F: FnMut(String),
    {
        for (line, command) in &self.commands {
            let output = execute(memory, command).with_context(|| format!("line {}", line))?;
            sink(output);
        }
        Ok(())
    }
}

/// Execute one command, returning its printable output
pub fn execute(
    memory: &MemoryManager,
    command: &Command,
) -> MemoryResult<String> {
    debug!(?command, "executing");
    let output = match command {
        Command::Alloc { id: Some(id), size } => {
            let start = memory.allocate(id.clone(), *size)?;
            format!("allocated {} at {} (size {})", id, start, size)
        }
        Command::Alloc { id: None, size } => {
            let (id, start) = memory.allocate_next(*size)?;
            format!("allocated {} at {} (size {})", id, start, size)
        }
        Command::Free { id } => {
            memory.free(id.as_str())?;
            format!("freed {}", id)
        }
        Command::Write { id, offset, text } => {
            memory.write(id.as_str(), *offset, text.as_bytes())?;
            format!("wrote {} byte(s) to {} at {}", text.len(), id, offset)
        }
        Command::Read { id, offset, length } => {
            let bytes = memory.read(id.as_str(), *offset, *length)?;
            format!("{:?}", String::from_utf8_lossy(&bytes))
        }
        Command::Defrag => {
            let moved = memory.defragment();
            format!("defragmented: {} block(s) moved", moved)
        }
        Command::Show => memory.snapshot().to_string(),
        Command::Stats => memory.stats().to_string(),
        Command::Blocks => {
            let blocks = memory.blocks();
            if blocks.is_empty() {
                "(no blocks)".to_string()
            } else {
                blocks
                    .iter()
                    .map(|block| {
                        format!(
                            "{} start={} size={} written={}",
                            block.id, block.start, block.size, block.written
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    };
    Ok(output)
}
