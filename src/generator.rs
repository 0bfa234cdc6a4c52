//! Background workload generator (§4.5).
//!
//! Runs as its own `std::thread`, independent of the CPU workers, sampling
//! synthetic processes with `rand::Rng::gen_range` — the same API the pack
//! uses for randomized test/workload generation in
//! `other_examples/3b3906ba_jon-axon-chipolata…processor.rs` and
//! `other_examples/98baf534_JonasKruckenberg-k23…executor/mod.rs`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::process::{Instruction, Operand};
use crate::system::Shared;

const OPERAND_VARS: [&str; 3] = ["x", "y", "z"];
const ADDRESS_BAND: u32 = 0x1000;
const MEM_SIZES: [usize; 8] = [64, 128, 256, 512, 1024, 2048, 4096, 8192];

/// Sample one random instruction program of `count` instructions, the same
/// grammar `screen -c` accepts (§4.5, §6). `name` is accepted for symmetry
/// with the explicit-program admission path but unused: PRINT's default
/// message is filled in from the process's own name at execution time
/// (§4.2), not at generation time.
pub fn random_program(cfg: &Config, _name: &str, rng: &mut impl Rng) -> Vec<Instruction> {
    let count = rng.gen_range(cfg.min_ins..=cfg.max_ins);
    (0..count).map(|_| random_instruction(rng)).collect()
}

fn random_instruction(rng: &mut impl Rng) -> Instruction {
    match rng.gen_range(0..7) {
        0 => Instruction::Declare { name: random_var(rng), value: rng.gen() },
        1 => Instruction::Print { var: None, message: String::new() },
        2 => Instruction::Add { dst: random_var(rng), src1: random_operand(rng), src2: random_operand(rng) },
        3 => Instruction::Sub { dst: random_var(rng), src1: random_operand(rng), src2: random_operand(rng) },
        4 => Instruction::Sleep { ticks: rng.gen_range(1..=8) },
        5 => Instruction::Write { address: random_address(rng), src: random_operand(rng) },
        _ => Instruction::Read { dst: random_var(rng), address: random_address(rng) },
    }
}

fn random_var(rng: &mut impl Rng) -> String {
    OPERAND_VARS[rng.gen_range(0..OPERAND_VARS.len())].to_string()
}

fn random_operand(rng: &mut impl Rng) -> Operand {
    if rng.gen_bool(0.5) {
        Operand::Var(random_var(rng))
    } else {
        Operand::Literal(rng.gen())
    }
}

fn random_address(rng: &mut impl Rng) -> String {
    format!("0x{:X}", rng.gen_range(0..ADDRESS_BAND))
}

/// Draw a memory size uniformly from the power-of-two sizes overlapping
/// `[cfg.min_mem_per_proc, cfg.max_mem_per_proc]` (§4.3 admission gate).
fn random_mem_size(cfg: &Config, rng: &mut impl Rng) -> usize {
    let candidates: Vec<usize> =
        MEM_SIZES.iter().copied().filter(|&s| s >= cfg.min_mem_per_proc && s <= cfg.max_mem_per_proc).collect();
    if candidates.is_empty() {
        cfg.min_mem_per_proc
    } else {
        candidates[rng.gen_range(0..candidates.len())]
    }
}

pub fn generator_loop(shared: Arc<Shared>) {
    let mut rng = rand::thread_rng();
    let interval = Duration::from_millis(shared.config.batch_process_freq as u64 * shared.config.delay_per_exec.max(1));
    log::info!("generator started, interval {interval:?}");
    while shared.generator_running.load(Ordering::SeqCst) {
        std::thread::sleep(interval);
        if !shared.generator_running.load(Ordering::SeqCst) {
            break;
        }
        let n = shared.next_pid.fetch_add(1, Ordering::SeqCst);
        let name = format!("p{n}");
        let mem_size = random_mem_size(&shared.config, &mut rng);
        let instructions = random_program(&shared.config, &name, &mut rng);
        match shared.admit(name.clone(), mem_size, instructions) {
            Ok(()) => log::info!("generator admitted {name}"),
            Err(e) => log::warn!("generator: {name} not admitted: {e}"),
        }
    }
    log::info!("generator stopped");
}
