use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

/// Exit code for invalid command-line usage
const EXIT_USAGE: u8 = 10;
/// Exit code for a program or input file that cannot be opened
const EXIT_UNREADABLE: u8 = 11;
/// Exit code for any other host failure
const EXIT_INTERNAL: u8 = 99;

/// Interpreter for the IPPcode frame-based stack bytecode.
///
/// Programs are JSON documents: a list of instructions, each with an order
/// number, an opcode and typed arguments.
///
/// EXAMPLES:
///     ippvm run prog.json                  Run a program, READ from stdin
///     ippvm run prog.json -i input.txt     READ from a file
///     ippvm check prog.json                Validate without running
///
/// ENVIRONMENT VARIABLES:
///     IPPVM_DEBUG_OUTPUT  Enable DPRINT/BREAK output (default: true)
///     IPPVM_STATS         Report execution statistics (default: false)
///     IPPVM_INPUT         Default READ source
///     IPPVM_CONFIG        Config file to use instead of ippvm.toml
///     RUST_LOG            Log filter (overrides -v)
#[derive(Parser)]
#[command(name = "ippvm")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program
    ///
    /// Exits with the program's EXIT code, 0 when it runs off the end, or
    /// the fixed code of the first error.
    ///
    /// EXAMPLES:
    ///     ippvm run prog.json
    ///     ippvm run prog.json --input in.txt --stats
    #[command(visible_alias = "r")]
    Run {
        /// Path to the program (JSON)
        file: PathBuf,
        /// READ source instead of stdin
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
        /// Report execution statistics on stderr
        #[arg(long)]
        stats: bool,
        /// Silence DPRINT and BREAK
        #[arg(long)]
        no_debug_output: bool,
        /// Use this config file instead of searching for ippvm.toml
        #[arg(long, short = 'c', env = "IPPVM_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a program without running it
    ///
    /// EXAMPLES:
    ///     ippvm check prog.json
    ///     ippvm check prog.json --json
    #[command(visible_alias = "c")]
    Check {
        /// Path to the program (JSON)
        file: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    ///
    /// EXAMPLES:
    ///     ippvm completions bash > ~/.local/share/bash-completion/completions/ippvm
    ///     ippvm completions zsh > ~/.zfunc/_ippvm
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.verbose);

    match dispatch(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn dispatch(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Run {
            file,
            input,
            stats,
            no_debug_output,
            config,
        } => {
            let flags = config::RunFlags {
                input,
                stats,
                no_debug_output,
                config,
            };
            let settings = config::Settings::resolve(&flags)?;
            commands::run::run(&file, &settings)
        }
        Commands::Check { file, json } => commands::check::run(&file, json),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(0)
        }
    }
}

/// Logs go to stderr; stdout belongs to the program
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<commands::UnreadableFile>().is_some() {
        EXIT_UNREADABLE
    } else {
        EXIT_INTERNAL
    }
}
