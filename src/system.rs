//! The `System` aggregate (§9 design note: "group into an explicit `System`
//! aggregate passed by reference to workers, generator, and console; never
//! rely on process-wide globals").
//!
//! `Shared` holds everything workers, the generator, and the console-facing
//! API touch concurrently, wrapped in one `Arc` so every thread gets a
//! pointer-stable handle — the fix for the source's "raw pointer into a
//! vector that may reallocate" bug (§9): processes live behind
//! `Arc<Mutex<Process>>`, so the ready queue and the master collection both
//! hold stable handles to the same process rather than copies or raw
//! addresses.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crate::config::Config;
use crate::error::{Result, SystemError};
use crate::generator;
use crate::interp::{self, StepOutcome};
use crate::mem::alloc::{Allocator, MemoryBlock};
use crate::mem::backing_store::BackingStore;
use crate::mem::pager::Pager;
use crate::process::{Instruction, LogLine, Process, Termination};
use crate::sched::{ReadyQueue, SchedulerKind};

const MIN_PROC_MEM: usize = 64;
const MAX_PROC_MEM: usize = 8192;

/// Everything shared across worker threads, the generator thread, and the
/// console-facing handle.
pub struct Shared {
    pub(crate) config: Config,
    ready_queue: ReadyQueue,
    allocator: Mutex<Allocator>,
    pager: Mutex<Pager>,
    processes: Mutex<HashMap<String, Arc<Mutex<Process>>>>,
    active_ticks: AtomicU64,
    idle_ticks: AtomicU64,
    pub(crate) next_pid: AtomicU64,
    stop_scheduler: AtomicBool,
    pub(crate) generator_running: AtomicBool,
    output_dir: PathBuf,
}

impl Shared {
    /// §4.3 admission gate shared by `screen -s`, `screen -c`, and the
    /// generator: validate the requested size, allocate, then enqueue.
    pub fn admit(&self, name: String, mem_size: usize, instructions: Vec<Instruction>) -> Result<()> {
        if !is_valid_mem_size(mem_size) {
            return Err(SystemError::InvalidMemorySize);
        }
        let mut processes = self.processes.lock().unwrap();
        if processes.contains_key(&name) {
            return Err(SystemError::DuplicateProcess(name));
        }
        let start = self.allocator.lock().unwrap().allocate(&name, mem_size);
        let Some(_start) = start else {
            return Err(SystemError::AllocationFailed);
        };
        let process = Arc::new(Mutex::new(Process::new(name.clone(), instructions, mem_size)));
        processes.insert(name.clone(), process.clone());
        drop(processes);
        self.ready_queue.enqueue(process);
        log::info!("admitted process {name} ({mem_size} bytes)");
        Ok(())
    }
}

fn is_valid_mem_size(size: usize) -> bool {
    size.is_power_of_two() && (MIN_PROC_MEM..=MAX_PROC_MEM).contains(&size)
}

/// §3 process-inspection view (`screen -r`), built by mirroring the
/// pager's authoritative page table onto the request rather than exposing
/// `Process` (and its lock) directly to the console.
pub struct ProcessSnapshot {
    pub name: String,
    pub created_at: SystemTime,
    pub finished_at: Option<SystemTime>,
    pub core: Option<usize>,
    pub ip: usize,
    pub total_instructions: usize,
    pub symbols: Vec<(String, u16)>,
    pub termination: Option<Termination>,
    pub log: Vec<LogLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Queued,
    Running,
    Finished,
    ShutDown,
}

#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub name: String,
    pub core: Option<usize>,
    pub state: ProcessState,
    pub ip: usize,
    pub total_instructions: usize,
}

#[derive(Debug, Clone)]
pub struct LsSnapshot {
    pub cores_used: usize,
    pub cores_total: usize,
    pub cpu_utilization: f64,
    pub processes: Vec<ProcessSummary>,
}

#[derive(Debug, Clone, Copy)]
pub struct VmStat {
    pub total_ticks: u64,
    pub active_ticks: u64,
    pub idle_ticks: u64,
    pub pages_paged_in: u64,
    pub pages_paged_out: u64,
    pub used_memory: usize,
    pub total_memory: usize,
}

pub struct MemorySnapshot {
    pub timestamp: String,
    pub processes_in_memory: usize,
    pub external_fragmentation_bytes: usize,
    pub total_memory: usize,
    pub blocks_high_to_low: Vec<MemoryBlock>,
}

/// The console-facing handle (§9). Owns the worker/generator thread
/// handles; everything else lives in the shared, `Arc`-wrapped `Shared`.
pub struct System {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    generator_handle: Option<JoinHandle<()>>,
    running: bool,
    last_ls_snapshot: Mutex<Option<LsSnapshot>>,
}

impl System {
    /// `initialize` (§6): parse config text, open the backing store, size
    /// the allocator and pager over `max-overall-mem`.
    pub fn initialize(config_text: &str, output_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let config = Config::parse(config_text);
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        let swap_path = output_dir.join("csopesy.swap");
        let frame_words = config.mem_per_frame / 2;
        let backing_store = BackingStore::open(swap_path, frame_words)?;
        let allocator = Allocator::new(config.max_overall_mem);
        let pager = Pager::new(config.max_overall_mem, config.mem_per_frame, backing_store);
        let shared = Shared {
            config,
            ready_queue: ReadyQueue::new(),
            allocator: Mutex::new(allocator),
            pager: Mutex::new(pager),
            processes: Mutex::new(HashMap::new()),
            active_ticks: AtomicU64::new(0),
            idle_ticks: AtomicU64::new(0),
            next_pid: AtomicU64::new(1),
            stop_scheduler: AtomicBool::new(false),
            generator_running: AtomicBool::new(false),
            output_dir,
        };
        log::info!("system initialized");
        Ok(Self {
            shared: Arc::new(shared),
            workers: Vec::new(),
            generator_handle: None,
            running: false,
            last_ls_snapshot: Mutex::new(None),
        })
    }

    fn require_running_state(&self, expected: bool, err: SystemError) -> Result<()> {
        if self.running == expected {
            Ok(())
        } else {
            Err(err)
        }
    }

    /// `scheduler-start`: spins up `num-cpu` workers and the generator
    /// (§5: "N CPU workers + 1 generator").
    pub fn scheduler_start(&mut self) -> Result<()> {
        self.require_running_state(false, SystemError::AlreadyRunning)?;
        self.shared.stop_scheduler.store(false, Ordering::SeqCst);
        self.shared.generator_running.store(true, Ordering::SeqCst);
        for core_id in 0..self.shared.config.num_cpu {
            let shared = self.shared.clone();
            self.workers.push(thread::spawn(move || worker_loop(shared, core_id)));
        }
        let shared = self.shared.clone();
        self.generator_handle = Some(thread::spawn(move || generator::generator_loop(shared)));
        self.running = true;
        log::info!("scheduler started with {} workers", self.shared.config.num_cpu);
        Ok(())
    }

    /// `scheduler-stop` (§5): stop and join the generator first, then raise
    /// the shared shutdown flag, wake every worker, and join them. Workers
    /// drain their current queue before exiting (§4.1 liveness).
    pub fn scheduler_stop(&mut self) -> Result<()> {
        self.require_running_state(true, SystemError::NotRunning)?;
        self.shared.generator_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.generator_handle.take() {
            let _ = handle.join();
        }
        self.shared.stop_scheduler.store(true, Ordering::SeqCst);
        self.shared.ready_queue.wake_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.running = false;
        log::info!("scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// `screen -s <name> <mem>`: admit with a random instruction program,
    /// same generation path the background generator uses (§4.5).
    pub fn screen_s(&self, name: &str, mem_size: usize) -> Result<()> {
        let mut rng = rand::thread_rng();
        let instructions = generator::random_program(&self.shared.config, name, &mut rng);
        self.shared.admit(name.to_string(), mem_size, instructions)
    }

    /// `screen -c <name> <mem> "<instructions>"`: admit with an explicit
    /// program (§6 instruction text grammar).
    pub fn screen_c(&self, name: &str, mem_size: usize, instruction_text: &str) -> Result<()> {
        let instructions = interp::parse::parse_program(instruction_text)?;
        self.shared.admit(name.to_string(), mem_size, instructions)
    }

    /// `screen -r <name>`: inspect a single process.
    pub fn screen_r(&self, name: &str) -> Result<ProcessSnapshot> {
        let processes = self.shared.processes.lock().unwrap();
        let handle = processes.get(name).ok_or_else(|| SystemError::UnknownProcess(name.to_string()))?;
        let process = handle.lock().unwrap();
        let mut symbols: Vec<(String, u16)> = process.symbols.iter().map(|(k, v)| (k.clone(), *v)).collect();
        symbols.sort();
        Ok(ProcessSnapshot {
            name: process.name.clone(),
            created_at: process.created_at,
            finished_at: process.finished_at,
            core: process.core,
            ip: process.ip,
            total_instructions: process.instructions.len(),
            symbols,
            termination: process.termination.clone(),
            log: process.log.clone(),
        })
    }

    /// `screen -ls`: snapshot report across every known process, plus
    /// cached for `report-util`.
    pub fn screen_ls(&self) -> LsSnapshot {
        let processes = self.shared.processes.lock().unwrap();
        let mut cores_used = 0;
        let mut summaries = Vec::with_capacity(processes.len());
        for handle in processes.values() {
            let p = handle.lock().unwrap();
            let state = if p.is_shutdown() {
                ProcessState::ShutDown
            } else if p.is_finished() {
                ProcessState::Finished
            } else if p.core.is_some() {
                cores_used += 1;
                ProcessState::Running
            } else {
                ProcessState::Queued
            };
            summaries.push(ProcessSummary {
                name: p.name.clone(),
                core: p.core,
                state,
                ip: p.ip,
                total_instructions: p.instructions.len(),
            });
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        let cores_total = self.shared.config.num_cpu;
        let snapshot = LsSnapshot {
            cores_used,
            cores_total,
            cpu_utilization: if cores_total == 0 { 0.0 } else { cores_used as f64 / cores_total as f64 },
            processes: summaries,
        };
        *self.last_ls_snapshot.lock().unwrap() = Some(snapshot.clone());
        snapshot
    }

    /// `process-smi`: full per-process status (superset of `screen -r` for
    /// every process at once).
    pub fn process_smi(&self) -> Vec<ProcessSnapshot> {
        let names: Vec<String> = self.shared.processes.lock().unwrap().keys().cloned().collect();
        names.iter().filter_map(|n| self.screen_r(n).ok()).collect()
    }

    /// `vmstat`: tick and paging accounting (§4.1, §4.4).
    pub fn vmstat(&self) -> VmStat {
        let active = self.shared.active_ticks.load(Ordering::SeqCst);
        let idle = self.shared.idle_ticks.load(Ordering::SeqCst);
        let pager = self.shared.pager.lock().unwrap();
        let allocator = self.shared.allocator.lock().unwrap();
        VmStat {
            total_ticks: active + idle,
            active_ticks: active,
            idle_ticks: idle,
            pages_paged_in: pager.pages_paged_in,
            pages_paged_out: pager.pages_paged_out,
            used_memory: allocator.total() - allocator.external_fragmentation(),
            total_memory: allocator.total(),
        }
    }

    /// `report-util`: persist the last `screen -ls` snapshot to
    /// `csopesy-log.txt` (§6).
    pub fn report_util(&self) -> io::Result<()> {
        let snapshot = self.last_ls_snapshot.lock().unwrap().clone();
        let Some(snapshot) = snapshot else {
            log::warn!("report-util: no prior screen -ls snapshot to persist");
            return Ok(());
        };
        let path = self.shared.output_dir.join("csopesy-log.txt");
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        writeln!(
            file,
            "CPU utilization: {:.0}% ({}/{} cores)",
            snapshot.cpu_utilization * 100.0,
            snapshot.cores_used,
            snapshot.cores_total
        )?;
        for p in &snapshot.processes {
            writeln!(file, "{} {:?} {}/{}", p.name, p.state, p.ip, p.total_instructions)?;
        }
        Ok(())
    }

    /// Memory-snapshot data (§6): the interface an external periodic dumper
    /// consumes; this crate does not itself schedule the dump.
    pub fn memory_snapshot(&self) -> MemorySnapshot {
        let allocator = self.shared.allocator.lock().unwrap();
        let mut blocks: Vec<MemoryBlock> = allocator.blocks().to_vec();
        blocks.reverse();
        MemorySnapshot {
            timestamp: interp::format_timestamp(SystemTime::now()),
            processes_in_memory: allocator.processes_in_memory(),
            external_fragmentation_bytes: allocator.external_fragmentation(),
            total_memory: allocator.total(),
            blocks_high_to_low: blocks,
        }
    }

    /// Render and write one `memory_stamp_<seq>.txt` (§6 format).
    pub fn write_memory_snapshot(&self, seq: u64) -> io::Result<()> {
        let snapshot = self.memory_snapshot();
        let path = self.shared.output_dir.join(format!("memory_stamp_{seq}.txt"));
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        writeln!(file, "Timestamp: {}", snapshot.timestamp)?;
        writeln!(file, "Number of processes in memory: {}", snapshot.processes_in_memory)?;
        writeln!(file, "Total external fragmentation in KB: {:.2}", snapshot.external_fragmentation_bytes as f64 / 1024.0)?;
        writeln!(file)?;
        writeln!(file, "----end---- = {}", snapshot.total_memory)?;
        for block in &snapshot.blocks_high_to_low {
            if !block.is_free() {
                writeln!(file, "{} {}", block.start + block.size, block.start)?;
                writeln!(file, "{}", block.owner)?;
            }
        }
        writeln!(file, "----start---- = 0")?;
        Ok(())
    }
}

/// §4.1 worker loop: `dequeue_blocking` → `execute_slice` → optional
/// re-enqueue, forever, until the ready queue signals shutdown.
fn worker_loop(shared: Arc<Shared>, core_id: usize) {
    loop {
        match shared.ready_queue.dequeue_blocking(&shared.stop_scheduler, &shared.idle_ticks) {
            None => break,
            Some(process) => run_slice(&shared, &process, core_id),
        }
    }
    log::info!("cpu worker {core_id} shutting down");
}

fn run_slice(shared: &Shared, handle: &Arc<Mutex<Process>>, core_id: usize) {
    let quantum = match shared.config.scheduler {
        SchedulerKind::Fcfs => usize::MAX,
        SchedulerKind::RoundRobin => shared.config.quantum_cycles as usize,
    };
    let mem_total = shared.config.max_overall_mem;
    let mut executed = 0usize;
    let mut finished = false;

    while executed < quantum {
        let outcome;
        {
            let mut process = handle.lock().unwrap();
            if process.is_finished() {
                finished = true;
                break;
            }
            process.core = Some(core_id);
            process.last_active_at = Some(SystemTime::now());
            {
                let mut pager = shared.pager.lock().unwrap();
                outcome = interp::step(&mut process, &mut pager, mem_total, Some(core_id), SystemTime::now());
                process.page_table = pager.page_table_snapshot(&process.name);
            }
            if let Err(e) = append_process_log(&shared.output_dir, &process) {
                log::warn!("log file write failed for {}: {e}", process.name);
            }
            finished = process.is_finished();
        }
        shared.active_ticks.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(shared.config.delay_per_exec));
        if let StepOutcome::Slept { ticks } = outcome {
            thread::sleep(Duration::from_millis(ticks as u64 * shared.config.delay_per_exec));
        }
        executed += 1;
        if finished {
            break;
        }
    }

    if finished {
        let name = handle.lock().unwrap().name.clone();
        shared.allocator.lock().unwrap().free(&name);
        // Frame-table entries are not cleared here: they outlive the
        // process and are reclaimed only by FIFO eviction (§3 "Ownership &
        // lifecycle"), matching the original's `freeMemory`/`evictPageAndReturnFrame`
        // split between the contiguous allocator and the paged frame pool.
        log::info!("process {name} left core {core_id}: finished or shut down");
    } else {
        handle.lock().unwrap().core = None;
        shared.ready_queue.enqueue(handle.clone());
    }
}

fn append_process_log(output_dir: &Path, process: &Process) -> io::Result<()> {
    let path = output_dir.join(format!("{}.txt", process.name));
    let is_new = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if is_new {
        writeln!(file, "Process name: {}", process.name)?;
        writeln!(file, "Logs:")?;
        writeln!(file)?;
    }
    if let Some(last) = process.log.last() {
        let core = last.core.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
        writeln!(file, "({}) Core:{} {}", last.timestamp, core, last.message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_system(config_text: &str) -> (System, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let system = System::initialize(config_text, dir.path()).unwrap();
        (system, dir)
    }

    #[test]
    fn initialize_then_guarded_command_runs() {
        let (system, _dir) = test_system("num-cpu 1 delay-per-exec 0 max-overall-mem 64 mem-per-frame 16");
        system.screen_c("p1", 64, "DECLARE a 7").unwrap();
        let snap = system.screen_r("p1").unwrap();
        assert_eq!(snap.total_instructions, 1);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let (system, _dir) = test_system("max-overall-mem 64");
        system.screen_c("p1", 64, "DECLARE a 1").unwrap();
        let err = system.screen_c("p1", 64, "DECLARE a 1").unwrap_err();
        assert!(matches!(err, SystemError::DuplicateProcess(_)));
    }

    #[test]
    fn allocation_failure_surfaces_as_error() {
        let (system, _dir) = test_system("max-overall-mem 32");
        system.screen_c("p1", 32, "DECLARE a 1").unwrap();
        let err = system.screen_c("p2", 32, "DECLARE a 1").unwrap_err();
        assert!(matches!(err, SystemError::AllocationFailed));
    }

    #[test]
    fn unknown_process_is_rejected() {
        let (system, _dir) = test_system("max-overall-mem 64");
        assert!(matches!(system.screen_r("ghost").unwrap_err(), SystemError::UnknownProcess(_)));
    }

    #[test]
    fn scheduler_runs_fcfs_process_to_completion() {
        let (mut system, _dir) = test_system(
            "num-cpu 1 scheduler fcfs delay-per-exec 0 max-overall-mem 64 mem-per-frame 16 batch-process-freq 1000000",
        );
        system.screen_c("p1", 64, "DECLARE a 7; WRITE 0x0 a; READ b 0x0").unwrap();
        system.scheduler_start().unwrap();
        let mut tries = 0;
        loop {
            let snap = system.screen_r("p1").unwrap();
            if snap.termination.is_some() || tries > 200 {
                break;
            }
            tries += 1;
            thread::sleep(Duration::from_millis(10));
        }
        system.scheduler_stop().unwrap();
        let snap = system.screen_r("p1").unwrap();
        assert_eq!(snap.termination, Some(Termination::Finished));
        let b = snap.symbols.iter().find(|(n, _)| n == "b").unwrap().1;
        assert_eq!(b, 7);
    }
}
