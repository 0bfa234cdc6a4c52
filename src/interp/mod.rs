//! Per-process instruction interpreter (§4.2).
//!
//! All arithmetic is on wrapping u16 words. One call to [`step`] executes
//! exactly one instruction and advances `process.ip`, matching the
//! instruction-at-a-time shape the scheduler's quantum counts against.

pub mod parse;

use std::time::SystemTime;

use crate::mem::pager::Pager;
use crate::process::{Instruction, Process};

/// Format a timestamp the way the original console does:
/// `MM/DD/YYYY hh:mm:ss AM/PM`.
pub fn format_timestamp(t: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Local> = t.into();
    datetime.format("%m/%d/%Y %I:%M:%S %p").to_string()
}

/// Outcome of executing a single instruction, for the worker loop.
pub enum StepOutcome {
    /// Instruction executed normally; process may still have more to run.
    Continued,
    /// Process hit a memory access violation and was shut down in place.
    ShutDown,
    /// Wall-clock stall the worker must additionally sleep for SLEEP
    /// (`ticks * delay_per_exec` ms), on top of the per-instruction delay.
    Slept { ticks: u8 },
}

/// Execute `process.instructions[process.ip]`, mutating symbols, the
/// console log, and virtual memory (through `pager`) as needed, then
/// advances the instruction pointer. `mem_total` is the global bound
/// READ/WRITE addresses are validated against (§4.2).
pub fn step(
    process: &mut Process,
    pager: &mut Pager,
    mem_total: usize,
    core: Option<usize>,
    now: SystemTime,
) -> StepOutcome {
    let ts = format_timestamp(now);
    let instruction = process.instructions[process.ip].clone();
    let mut outcome = StepOutcome::Continued;

    let log_entry = match instruction {
        Instruction::Declare { name, value } => {
            if process.write_symbol(&name, value) {
                format!("Declared {name} = {value}")
            } else {
                "skipped: symbol table full".to_string()
            }
        }
        Instruction::Add { dst, src1, src2 } => {
            let a = process.resolve(&src1);
            let b = process.resolve(&src2);
            let result = a.wrapping_add(b);
            process.write_symbol(&dst, result);
            format!("Added: {dst} = {result}")
        }
        Instruction::Sub { dst, src1, src2 } => {
            let a = process.resolve(&src1);
            let b = process.resolve(&src2);
            let result = a.wrapping_sub(b);
            process.write_symbol(&dst, result);
            format!("Subtracted: {dst} = {result}")
        }
        Instruction::Print { var, message } => {
            let text = match &var {
                Some(name) => {
                    if process.symbols.contains_key(name) {
                        format!("{message}{}", process.read_symbol(name))
                    } else {
                        format!("{message}undefined")
                    }
                }
                None if message.is_empty() => format!("Hello world from {}!", process.name),
                None => message.clone(),
            };
            text
        }
        Instruction::Sleep { ticks } => {
            outcome = StepOutcome::Slept { ticks };
            format!("Slept for {ticks} ticks.")
        }
        Instruction::Read { dst, address } => match validate_address(&address, mem_total) {
            Some(addr) => {
                let value = pager.read_u16(&process.name, addr).unwrap_or(0);
                process.write_symbol(&dst, value);
                format!("Read value {value} from {address} into {dst}")
            }
            None => {
                shut_process_down(process, &address, &ts);
                outcome = StepOutcome::ShutDown;
                process_log_message(process)
            }
        },
        Instruction::Write { address, src } => match validate_address(&address, mem_total) {
            Some(addr) => {
                let value = process.resolve(&src);
                let _ = pager.write_u16(&process.name, addr, value);
                format!("Wrote value {value} to {address}")
            }
            None => {
                shut_process_down(process, &address, &ts);
                outcome = StepOutcome::ShutDown;
                process_log_message(process)
            }
        },
    };

    process.push_log(ts, core, log_entry);
    process.ip += 1;
    if process.ip >= process.instructions.len() && !matches!(outcome, StepOutcome::ShutDown) {
        process.finish(SystemTime::now());
    }
    outcome
}

fn validate_address(text: &str, mem_total: usize) -> Option<u32> {
    let addr = parse::parse_hex_address(text)?;
    if addr < mem_total as u64 {
        Some(addr as u32)
    } else {
        None
    }
}

fn shut_process_down(process: &mut Process, offending: &str, ts: &str) {
    let message = format!(
        "Process {} shut down due to memory access violation error that occurred at {}. {} invalid.",
        process.name, ts, offending
    );
    process.shutdown(SystemTime::now(), message);
}

fn process_log_message(process: &Process) -> String {
    match &process.termination {
        Some(crate::process::Termination::ShutDown { message }) => message.clone(),
        _ => String::new(),
    }
}
