use crate::commands::read_file;
use anyhow::{Context, Result};
use ippvm_runtime::{Opcode, Program, Runtime};
use serde_json::json;
use std::path::Path;

/// Validate a program without running it
///
/// Returns 0 for a valid program and the loader's exit code otherwise.
pub fn run(file_path: &Path, json_output: bool) -> Result<u8> {
    let source = read_file(file_path)?;

    match Runtime::load(&source) {
        Ok(program) => {
            if json_output {
                let output = json!({
                    "file": file_path.display().to_string(),
                    "valid": true,
                    "instructions": program.len(),
                    "labels": label_names(&program),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialize result")?
                );
            } else {
                println!(
                    "{}: ok ({} instructions, {} labels)",
                    file_path.display(),
                    program.len(),
                    program.labels().len()
                );
            }
            Ok(0)
        }
        Err(err) => {
            if json_output {
                let output = json!({
                    "file": file_path.display().to_string(),
                    "valid": false,
                    "error": err.to_string(),
                    "exit_code": err.exit_code(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialize result")?
                );
            } else {
                eprintln!("{}: {}", file_path.display(), err);
            }
            Ok(err.exit_code())
        }
    }
}

/// Label names in program order
fn label_names(program: &Program) -> Vec<String> {
    program
        .instructions()
        .iter()
        .filter(|instruction| instruction.opcode == Opcode::Label)
        .filter_map(|instruction| instruction.label(0).ok())
        .map(str::to_string)
        .collect()
}
