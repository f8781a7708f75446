//! memsim - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use memsim::memory::MemoryManager;
use memsim::repl::Repl;
use memsim::script::{split_commands, Script};
use memsim::util::config::{load_config, SimConfig};
use memsim::util::logger::{self, LogLevel};
use memsim::workload::{run_workload, WorkloadConfig};
use memsim::{demo, NAME, VERSION};

/// Simulated fixed-size memory with first-fit allocation and compaction
#[derive(Parser, Debug)]
#[command(name = "memsim")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Number of memory cells (overrides config and MEMSIM_SIZE)
    #[arg(short, long, global = true)]
    size: Option<usize>,

    /// Config file (defaults to ./memsim.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command script file
    Run {
        /// Script to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Run commands given on the command line (`; ` separates commands)
    Eval {
        /// Commands to run
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Replay the fragmentation walkthrough on a 5-cell memory
    Demo {
        /// Print the final memory state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive session
    Repl,

    /// Run a seeded random workload and report fragmentation
    Stress {
        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of operations
        #[arg(long, default_value_t = 1000)]
        ops: usize,

        /// Largest block size requested
        #[arg(long, default_value_t = 8)]
        max_block: usize,

        /// Never defragment on allocation failure
        #[arg(long)]
        no_defrag: bool,
    },

    /// Print the effective configuration
    ShowConfig,

    /// Print version information
    Version,
}

fn load(args: &Args) -> Result<SimConfig> {
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(size) = args.size {
        config.memory.size = size;
    }
    if args.verbose {
        config.log.level = LogLevel::Debug;
    }
    config.validate()?;
    Ok(config)
}

fn run_script(
    memory: &MemoryManager,
    source: &str,
) -> Result<()> {
    let script = Script::parse(source)?;
    script.execute(memory, |line| println!("{}", line))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load(&args)?;
    logger::init_with_level(config.log.level);

    if args.verbose {
        eprintln!("memsim version: {}", VERSION);
        eprintln!("Memory size: {}", config.memory.size);
    }

    match args.command {
        Commands::Run { file } => {
            let memory = MemoryManager::from_config(&config.memory)?;
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            run_script(&memory, &source)
                .with_context(|| format!("Failed to run: {}", file.display()))?;
        }
        Commands::Eval { code } => {
            let memory = MemoryManager::from_config(&config.memory)?;
            run_script(&memory, &split_commands(&code)).context("Failed to evaluate commands")?;
        }
        Commands::Demo { json } => {
            let memory = MemoryManager::new(5)?;
            for line in demo(&memory)? {
                println!("{}", line);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&memory.snapshot())?);
            }
        }
        Commands::Repl => {
            let memory = MemoryManager::from_config(&config.memory)?;
            Repl::new(memory, config.repl.clone())?.run()?;
        }
        Commands::Stress {
            seed,
            ops,
            max_block,
            no_defrag,
        } => {
            let memory = MemoryManager::from_config(&config.memory)?;
            let workload = WorkloadConfig {
                seed,
                operations: ops,
                max_block,
                defragment_on_failure: !no_defrag,
            };
            let report = run_workload(&memory, &workload);
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{}", memory.snapshot());
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
