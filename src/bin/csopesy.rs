//! Thin line-oriented reference driver over [`csopesy_emu::System`] (§10.6).
//!
//! Not the interactive console `spec.md` scopes out — no banner, no screen
//! navigation chrome. Reads one command per line from stdin and calls
//! straight into the library, matching the small `clap`-driven CLI front
//! ends over a library core used elsewhere in the pack (`tools/debugger`).

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use csopesy_emu::{System, SystemError};

#[derive(Parser)]
#[command(no_binary_name = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Initialize,
    #[command(name = "scheduler-start")]
    SchedulerStart,
    #[command(name = "scheduler-stop")]
    SchedulerStop,
    Screen {
        #[arg(short = 's', num_args = 2, value_names = ["NAME", "MEM"])]
        s: Option<Vec<String>>,
        #[arg(short = 'c', num_args = 2, value_names = ["NAME", "MEM"], requires = "instructions")]
        c: Option<Vec<String>>,
        /// `;`-separated instruction text, only meaningful with `-c`.
        instructions: Option<String>,
        #[arg(short = 'r')]
        r: Option<String>,
        #[arg(long = "ls")]
        ls: bool,
    },
    #[command(name = "process-smi")]
    ProcessSmi,
    Vmstat,
    #[command(name = "report-util")]
    ReportUtil,
    Exit,
}

fn main() -> Result<()> {
    env_logger::init();
    let stdin = io::stdin();
    let mut system: Option<System> = None;

    print!("csopesy> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let tokens = tokenize(&line);
        if tokens.is_empty() {
            print!("csopesy> ");
            io::stdout().flush().ok();
            continue;
        }
        match Line::try_parse_from(&tokens) {
            Ok(parsed) => match run(parsed.command, &mut system) {
                Ok(should_exit) if should_exit => break,
                Ok(_) => {}
                Err(e) => println!("{e}"),
            },
            Err(_) => println!("Unknown command: {line}"),
        }
        print!("csopesy> ");
        io::stdout().flush().ok();
    }
    Ok(())
}

/// Splits on whitespace but keeps `"..."`-quoted spans intact, for `screen
/// -c`'s instruction text (§6 instruction grammar).
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn run(command: Command, system: &mut Option<System>) -> Result<bool> {
    match command {
        Command::Initialize => {
            let config_text = std::fs::read_to_string("config.txt").unwrap_or_default();
            *system = Some(System::initialize(&config_text, ".")?);
            println!("initialized");
        }
        Command::SchedulerStart => {
            with_system(system)?.scheduler_start()?;
            println!("scheduler started");
        }
        Command::SchedulerStop => {
            with_system(system)?.scheduler_stop()?;
            println!("scheduler stopped");
        }
        Command::Screen { s, c, instructions, r, ls } => {
            let sys = with_system(system)?;
            if let Some(args) = s {
                let mem: usize = args[1].parse().context("invalid memory size")?;
                sys.screen_s(&args[0], mem)?;
                println!("process {} created", args[0]);
            } else if let Some(args) = c {
                let mem: usize = args[1].parse().context("invalid memory size")?;
                let text = instructions.ok_or_else(|| anyhow!("screen -c requires instruction text"))?;
                sys.screen_c(&args[0], mem, &text)?;
                println!("process {} created", args[0]);
            } else if let Some(name) = r {
                let snap = sys.screen_r(&name)?;
                println!("{} ip={}/{} core={:?}", snap.name, snap.ip, snap.total_instructions, snap.core);
                for (k, v) in &snap.symbols {
                    println!("  {k} = {v}");
                }
            } else if ls {
                let snapshot = sys.screen_ls();
                println!(
                    "CPU utilization: {:.0}% ({}/{})",
                    snapshot.cpu_utilization * 100.0,
                    snapshot.cores_used,
                    snapshot.cores_total
                );
                for p in &snapshot.processes {
                    println!("{} {:?} {}/{}", p.name, p.state, p.ip, p.total_instructions);
                }
            } else {
                println!("Unknown command: screen requires -s, -c, -r, or -ls");
            }
        }
        Command::ProcessSmi => {
            for snap in with_system(system)?.process_smi() {
                println!("{} ip={}/{} core={:?}", snap.name, snap.ip, snap.total_instructions, snap.core);
            }
        }
        Command::Vmstat => {
            let stats = with_system(system)?.vmstat();
            println!(
                "total_ticks={} active={} idle={} paged_in={} paged_out={} mem={}/{}",
                stats.total_ticks,
                stats.active_ticks,
                stats.idle_ticks,
                stats.pages_paged_in,
                stats.pages_paged_out,
                stats.used_memory,
                stats.total_memory
            );
        }
        Command::ReportUtil => {
            with_system(system)?.report_util()?;
            println!("report written to csopesy-log.txt");
        }
        Command::Exit => {
            if let Some(sys) = system.as_mut() {
                if sys.is_running() {
                    sys.scheduler_stop()?;
                }
            }
            return Ok(true);
        }
    }
    Ok(false)
}

fn with_system(system: &mut Option<System>) -> Result<&mut System> {
    system.as_mut().ok_or_else(|| SystemError::NotInitialized.into())
}
