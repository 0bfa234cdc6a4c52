//! Configuration-file parsing (§6).
//!
//! Format: whitespace-separated `key value` tokens, any order. Unknown keys
//! are accepted and echoed via `log::warn!` rather than rejected, matching
//! the spec's "unknown keys accepted" rule. Not TOML/JSON — the original
//! format is a bespoke token stream, so a small hand-rolled tokenizer is the
//! faithful choice rather than pulling in a config-file crate for a format
//! it doesn't understand.

use crate::sched::SchedulerKind;

/// Resolved configuration, defaults per §6's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub num_cpu: usize,
    pub scheduler: SchedulerKind,
    pub quantum_cycles: u32,
    pub batch_process_freq: u32,
    pub min_ins: u32,
    pub max_ins: u32,
    pub delay_per_exec: u64,
    pub max_overall_mem: usize,
    pub mem_per_frame: usize,
    pub min_mem_per_proc: usize,
    pub max_mem_per_proc: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_cpu: 4,
            scheduler: SchedulerKind::Fcfs,
            quantum_cycles: 5,
            batch_process_freq: 1,
            min_ins: 5,
            max_ins: 10,
            delay_per_exec: 100,
            max_overall_mem: 16384,
            mem_per_frame: 16,
            min_mem_per_proc: 64,
            max_mem_per_proc: 4096,
        }
    }
}

impl Config {
    /// Parse configuration text, keeping defaults for anything missing or
    /// malformed. Never fails outright (§7: "print a single-line diagnostic,
    /// keep defaults").
    pub fn parse(text: &str) -> Self {
        let mut cfg = Self::default();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            let key = tokens[i];
            let Some(value) = tokens.get(i + 1) else {
                log::error!("config: key '{key}' has no value, ignoring");
                break;
            };
            i += 2;
            match key {
                "num-cpu" => assign_usize(&mut cfg.num_cpu, key, value, 1),
                "scheduler" => match value.to_ascii_lowercase().as_str() {
                    "fcfs" => cfg.scheduler = SchedulerKind::Fcfs,
                    "rr" => cfg.scheduler = SchedulerKind::RoundRobin,
                    other => log::error!("config: unrecognised scheduler '{other}', keeping default"),
                },
                "quantum-cycles" => assign_u32(&mut cfg.quantum_cycles, key, value, 1),
                "batch-process-freq" => assign_u32(&mut cfg.batch_process_freq, key, value, 1),
                "min-ins" => assign_u32(&mut cfg.min_ins, key, value, 1),
                "max-ins" => assign_u32(&mut cfg.max_ins, key, value, 1),
                "delay-per-exec" => assign_u64(&mut cfg.delay_per_exec, key, value, 0),
                "max-overall-mem" => assign_usize(&mut cfg.max_overall_mem, key, value, 1),
                "mem-per-frame" => assign_usize(&mut cfg.mem_per_frame, key, value, 1),
                "min-mem-per-proc" => assign_usize(&mut cfg.min_mem_per_proc, key, value, 1),
                "max-mem-per-proc" => assign_usize(&mut cfg.max_mem_per_proc, key, value, 1),
                other => {
                    log::warn!("config: unknown key '{other}' = '{value}' (accepted, ignored)");
                }
            }
        }
        cfg
    }
}

fn assign_usize(field: &mut usize, key: &str, value: &str, min: usize) {
    match value.parse::<usize>() {
        Ok(v) if v >= min => *field = v,
        Ok(v) => log::error!("config: '{key}' = {v} below minimum {min}, keeping default"),
        Err(_) => log::error!("config: '{key}' = '{value}' is not a number, keeping default"),
    }
}

fn assign_u32(field: &mut u32, key: &str, value: &str, min: u32) {
    match value.parse::<u32>() {
        Ok(v) if v >= min => *field = v,
        Ok(v) => log::error!("config: '{key}' = {v} below minimum {min}, keeping default"),
        Err(_) => log::error!("config: '{key}' = '{value}' is not a number, keeping default"),
    }
}

fn assign_u64(field: &mut u64, key: &str, value: &str, min: u64) {
    match value.parse::<u64>() {
        Ok(v) if v >= min => *field = v,
        Ok(v) => log::error!("config: '{key}' = {v} below minimum {min}, keeping default"),
        Err(_) => log::error!("config: '{key}' = '{value}' is not a number, keeping default"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.num_cpu, 4);
        assert_eq!(cfg.scheduler, SchedulerKind::Fcfs);
        assert_eq!(cfg.quantum_cycles, 5);
        assert_eq!(cfg.max_overall_mem, 16384);
        assert_eq!(cfg.mem_per_frame, 16);
    }

    #[test]
    fn parses_recognised_keys_any_order() {
        let cfg = Config::parse("scheduler rr num-cpu 2 quantum-cycles 3 delay-per-exec 0");
        assert_eq!(cfg.scheduler, SchedulerKind::RoundRobin);
        assert_eq!(cfg.num_cpu, 2);
        assert_eq!(cfg.quantum_cycles, 3);
        assert_eq!(cfg.delay_per_exec, 0);
    }

    #[test]
    fn unknown_keys_are_accepted_and_ignored() {
        let cfg = Config::parse("foo bar num-cpu 8");
        assert_eq!(cfg.num_cpu, 8);
    }

    #[test]
    fn malformed_value_keeps_default() {
        let cfg = Config::parse("num-cpu notanumber");
        assert_eq!(cfg.num_cpu, 4);
    }

    #[test]
    fn below_minimum_keeps_default() {
        let cfg = Config::parse("num-cpu 0");
        assert_eq!(cfg.num_cpu, 4);
    }
}
