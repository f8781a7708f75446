//! Line-based REPL with rustyline
//!
//! Reads command-language lines and runs them against one memory manager.
//! Meta commands start with `:`.

use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::{CompletionType, DefaultEditor, EditMode};

use owo_colors::OwoColorize;

use crate::memory::MemoryManager;
use crate::script::{execute, parse_line};
use crate::util::config::ReplConfig;

const HELP: &str = "\
Commands:
  alloc [<id>] <size>          allocate a block (first fit)
  free <id>                    free a block
  write <id> <offset> <text>   write text into a block
  read <id> <offset> <length>  read bytes from a block
  defrag                       compact all blocks toward offset 0
  show | stats | blocks        inspect memory
Meta:
  :help                        this text
  :quit                        leave (Ctrl-D works too)";

/// Result of evaluating one REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineResult {
    /// Command output
    Output(String),
    /// Parse or memory error
    Error(String),
    /// Nothing to do (blank or comment)
    Empty,
    /// User asked to leave
    Exit,
}

/// Evaluate one line against `memory`
pub fn eval_line(
    memory: &MemoryManager,
    line: &str,
) -> LineResult {
    let trimmed = line.trim();
    if let Some(meta) = trimmed.strip_prefix(':') {
        return match meta {
            "q" | "quit" | "exit" => LineResult::Exit,
            "h" | "help" => LineResult::Output(HELP.to_string()),
            other => LineResult::Error(format!("unknown meta command ':{}'", other)),
        };
    }

    match parse_line(line) {
        Ok(Some(command)) => match execute(memory, &command) {
            Ok(output) => LineResult::Output(output),
            Err(err) => LineResult::Error(err.to_string()),
        },
        Ok(None) => LineResult::Empty,
        Err(err) => LineResult::Error(err.to_string()),
    }
}

/// Interactive session over one memory manager
pub struct Repl {
    config: ReplConfig,
    editor: DefaultEditor,
    memory: MemoryManager,
}

impl Repl {
    /// Create a REPL; loads history if configured
    pub fn new(
        memory: MemoryManager,
        config: ReplConfig,
    ) -> anyhow::Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = DefaultEditor::with_config(rl_config)?;

        if let Some(ref history_file) = config.history_file {
            if history_file.exists() {
                let _ = editor.load_history(history_file);
            }
        }

        Ok(Self {
            config,
            editor,
            memory,
        })
    }

    /// Run until `:quit` or Ctrl-D
    pub fn run(&mut self) -> anyhow::Result<()> {
        println!(
            "memsim REPL - {} cells. Type :help for assistance",
            self.memory.capacity()
        );

        loop {
            match self.editor.readline(&self.config.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = self.editor.add_history_entry(line.as_str());
                    }
                    match eval_line(&self.memory, &line) {
                        LineResult::Output(out) => println!("{}", out),
                        LineResult::Error(err) => println!("{} {}", "error:".red().bold(), err),
                        LineResult::Empty => {}
                        LineResult::Exit => break,
                    }
                }
                Err(ReadlineError::Eof) => break,
                Err(ReadlineError::Interrupted) => {
                    println!("(Interrupted)");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(ref history_file) = self.config.history_file {
            let _ = self.editor.save_history(history_file);
        }

        Ok(())
    }

    /// The memory manager driven by this session
    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }
}
