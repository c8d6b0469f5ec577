use crate::commands::{read_file, UnreadableFile};
use crate::config::Settings;
use anyhow::Result;
use ippvm_runtime::{Runtime, VmOptions};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Load and run a program, returning the process exit code
pub fn run(file_path: &Path, settings: &Settings) -> Result<u8> {
    let source = read_file(file_path)?;

    let program = match Runtime::load(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{}: {}", file_path.display(), err);
            return Ok(err.exit_code());
        }
    };

    let input: Box<dyn BufRead> = match &settings.input {
        Some(path) => {
            let file = File::open(path).map_err(|source| UnreadableFile {
                path: path.clone(),
                source,
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    tracing::debug!(
        file = %file_path.display(),
        instructions = program.len(),
        "running program"
    );

    let runtime = Runtime::new()
        .with_options(VmOptions {
            debug_output: settings.debug_output,
        })
        .with_profiling(settings.stats);
    let outcome = runtime.execute(program, input);

    if let Err(fault) = &outcome.result {
        eprintln!("{}: {}", file_path.display(), fault);
    }
    if let Some(report) = &outcome.report {
        eprint!("{}", report);
    }

    Ok(outcome.exit_code())
}
