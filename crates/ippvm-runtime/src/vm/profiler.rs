//! Execution statistics
//!
//! Optional per-opcode counters. Disabled unless the VM is built with
//! profiling; when disabled the VM never touches it.

use crate::bytecode::Opcode;
use std::collections::HashMap;

/// Per-opcode execution counter
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    total_instructions: u64,
    instruction_counts: HashMap<Opcode, u64>,
    max_operand_depth: usize,
    max_local_depth: usize,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one executed instruction
    pub fn record_instruction(&mut self, opcode: Opcode) {
        self.total_instructions += 1;
        *self.instruction_counts.entry(opcode).or_insert(0) += 1;
    }

    /// Track the deepest operand stack and local frame stack seen
    pub fn update_depths(&mut self, operand_depth: usize, local_depth: usize) {
        self.max_operand_depth = self.max_operand_depth.max(operand_depth);
        self.max_local_depth = self.max_local_depth.max(local_depth);
    }

    pub fn total_instructions(&self) -> u64 {
        self.total_instructions
    }

    pub fn instruction_count(&self, opcode: Opcode) -> u64 {
        self.instruction_counts.get(&opcode).copied().unwrap_or(0)
    }

    /// Executed instructions that worked purely on the operand stack
    pub fn stack_form_instructions(&self) -> u64 {
        self.instruction_counts
            .iter()
            .filter(|(opcode, _)| opcode.is_stack_form())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn max_operand_depth(&self) -> usize {
        self.max_operand_depth
    }

    pub fn max_local_depth(&self) -> usize {
        self.max_local_depth
    }

    /// Human-readable report, opcodes sorted by count (descending)
    pub fn report(&self) -> String {
        let mut report = format!(
            "Total instructions executed: {}\n",
            self.total_instructions
        );
        report.push_str(&format!(
            "Stack-form instructions: {}\n",
            self.stack_form_instructions()
        ));
        report.push_str(&format!(
            "Max operand stack depth: {}\nMax local frame depth: {}\n",
            self.max_operand_depth, self.max_local_depth
        ));

        if self.instruction_counts.is_empty() {
            report.push_str("No instructions recorded\n");
            return report;
        }

        report.push_str("\nInstruction counts by opcode:\n");
        let mut counts: Vec<_> = self.instruction_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.name().cmp(b.0.name())));

        for (opcode, count) in counts {
            let percentage = (*count as f64 / self.total_instructions as f64) * 100.0;
            report.push_str(&format!(
                "  {:<12} {:>10} ({:>6.2}%)\n",
                opcode.name(),
                count,
                percentage
            ));
        }

        report
    }
}
