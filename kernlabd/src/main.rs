//! # Kernlab Daemon
//!
//! Headless driver for the simulated kernel: boots a system, spawns a
//! fleet of virtual processes, lets them chatter over the well-known
//! channels for a while, then prints a report.

use core_types::{Duration, Pid};
use kernel::{ProcessLogSink, System, SystemConfig, WorkerModel};
use std::env;
use std::process;
use std::sync::Arc;

const ROLES: [&str; 3] = ["worker", "daemon", "shell"];

struct RunConfig {
    system: SystemConfig,
    processes: usize,
    duration: Duration,
    realtime: bool,
    verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            processes: 4,
            duration: Duration::from_secs(30),
            realtime: false,
            verbose: false,
        }
    }
}

/// Prints process chatter as it happens
struct StdoutProcessLogs;

impl ProcessLogSink for StdoutProcessLogs {
    fn on_log(&self, pid: Pid, message: &str) {
        println!("[{}] {}", pid, message);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let config = parse_args(&args).unwrap_or_else(|err| {
        eprintln!("Error: {}", err);
        print_usage(&args[0]);
        process::exit(1);
    });

    let mut system = if config.verbose {
        System::with_process_log(config.system.clone(), Arc::new(StdoutProcessLogs))
    } else {
        System::new(config.system.clone())
    };

    for i in 0..config.processes {
        let name = format!("proc-{}", i);
        let role = ROLES[i % ROLES.len()];
        let priority = (i % 5) as u8 + 1;
        if let Err(err) = system.create_process(name, role, priority) {
            eprintln!("Failed to create process: {}", err);
            process::exit(1);
        }
    }

    system.start_all();
    if config.realtime {
        system.run_realtime(config.duration, Duration::from_millis(16));
    } else {
        system.run_for(config.duration);
    }
    system.pause_all();

    print_report(&system);
}

fn parse_args(args: &[String]) -> Result<RunConfig, String> {
    let mut config = RunConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--processes" | "-p" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --processes")?;
                config.processes = value
                    .parse()
                    .map_err(|_| format!("Invalid process count: {}", value))?;
            }
            "--duration-ms" | "-d" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --duration-ms")?;
                let millis: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid duration: {}", value))?;
                config.duration = Duration::from_millis(millis);
            }
            "--model" | "-m" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --model")?;
                config.system.model = match value.as_str() {
                    "virtual" => WorkerModel::Cooperative,
                    "thread" => WorkerModel::Parallel,
                    other => return Err(format!("Invalid model: {}", other)),
                };
            }
            "--seed" | "-s" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --seed")?;
                config.system.seed = value
                    .parse()
                    .map_err(|_| format!("Invalid seed: {}", value))?;
            }
            "--enforce" => {
                config.system.enforce_access = true;
            }
            "--realtime" => {
                config.realtime = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --processes <N>     Number of virtual processes (default: 4)");
    eprintln!("  -d, --duration-ms <MS>  Simulated run time in milliseconds (default: 30000)");
    eprintln!("  -m, --model <MODEL>     Worker model: virtual | thread (default: virtual)");
    eprintln!("  -s, --seed <SEED>       Seed for the randomized loops (default: 0)");
    eprintln!("      --enforce           Start with access enforcement enabled");
    eprintln!("      --realtime          Pace the run on host time instead of fast-forwarding");
    eprintln!("  -v, --verbose           Print process chatter as it happens");
    eprintln!("  -h, --help              Show this help");
}

fn print_report(system: &System) {
    println!();
    println!("PROCESSES");
    println!(
        "{:<10} {:<12} {:<8} {:<8} {:<11} {:>8} {:>10}",
        "PID", "NAME", "ROLE", "OWNER", "STATE", "PRIO", "CPU(ms)"
    );
    for p in system.process_snapshots() {
        println!(
            "{:<10} {:<12} {:<8} {:<8} {:<11} {:>8} {:>10}",
            p.pid.as_raw(),
            p.name,
            p.role,
            p.owner,
            p.state,
            p.priority,
            p.cpu_time.as_millis()
        );
    }

    println!();
    println!("CHANNELS");
    println!(
        "{:<10} {:<8} {:<8} {:>12}",
        "NAME", "KIND", "OWNER", "OCCUPANCY"
    );
    for c in system.channel_snapshots() {
        let owner = c
            .descriptor
            .as_ref()
            .map(|d| d.owner.to_string())
            .unwrap_or_else(|| "-".to_string());
        let occupancy = match c.occupancy.capacity {
            Some(capacity) => format!("{}/{}", c.occupancy.used, capacity),
            None => format!("{}", c.occupancy.used),
        };
        println!("{:<10} {:<8} {:<8} {:>12}", c.name, c.kind, owner, occupancy);
    }

    println!();
    println!("STATS");
    println!("  messages total : {}", system.messages_total());
    println!("  throughput     : {}/s", system.throughput());
    println!("  enforcement    : {}", system.is_enforced());

    println!();
    println!("RECENT AUDIT LOG");
    let mut entries = system.recent_log(20);
    entries.reverse();
    for entry in entries {
        println!(
            "  #{:<5} {:>8}ms {:<9} {:<7} {:<14} {}",
            entry.seq,
            entry.timestamp.as_nanos() / 1_000_000,
            entry.origin,
            entry.severity,
            entry.operation,
            entry.detail
        );
    }
}
