// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Spool CLI - demos for the cooperative scheduler.

mod config;
mod demo;
mod help;
mod output;

use std::env;
use std::path::Path;
use std::process;

use spool_rt::{RuntimeError, Scheduler, Task, TcpServer, Value};

use config::DemoConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp(None)
        .try_init()
        .ok();
    output::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config = match take_config(&mut args) {
        Ok(config) => config,
        Err(msg) => fail(&msg),
    };

    let Some(cmd) = args.first().cloned() else {
        help::print_usage();
        return;
    };
    let rest = &args[1..];

    if rest.iter().any(|a| a == "--help" || a == "-h") {
        match cmd.as_str() {
            "serve" => help::print_serve_help(),
            "request" => help::print_request_help(),
            "echo" => help::print_echo_help(),
            _ => help::print_usage(),
        }
        return;
    }

    match cmd.as_str() {
        "serve" => {
            if let Some(addr) = rest.first() {
                config.set_addr(addr).unwrap_or_else(|e| fail(&e));
            }
            let max_clients = rest.get(1).map(|n| {
                n.parse::<usize>()
                    .unwrap_or_else(|_| fail(&format!("invalid client count '{}'", n)))
            });
            cmd_serve(&config, max_clients);
        }
        "request" => {
            if let Some(addr) = rest.first() {
                config.set_addr(addr).unwrap_or_else(|e| fail(&e));
            }
            if let Some(count) = rest.get(1) {
                config.set_requests(count).unwrap_or_else(|e| fail(&e));
            }
            cmd_request(&config);
        }
        "echo" => cmd_echo(),
        "help" | "--help" | "-h" => help::print_usage(),
        "version" | "--version" | "-V" => {
            println!("spool {}", env!("CARGO_PKG_VERSION"));
        }
        other => {
            eprintln!("{}: unknown command: {}", output::error_label(), other);
            help::print_usage();
            process::exit(1);
        }
    }
}

/// Strip `--config <file>` from `args` and load it.
fn take_config(args: &mut Vec<String>) -> Result<DemoConfig, String> {
    let Some(pos) = args.iter().position(|a| a == "--config") else {
        return Ok(DemoConfig::default());
    };
    if pos + 1 >= args.len() {
        return Err("--config requires a file".to_string());
    }
    let path = args.remove(pos + 1);
    args.remove(pos);
    DemoConfig::load_file(Path::new(&path))
}

fn fail(msg: &str) -> ! {
    eprintln!("{}: {}", output::error_label(), msg);
    process::exit(1);
}

fn cmd_serve(config: &DemoConfig, max_clients: Option<usize>) {
    let listener = TcpServer::bind((config.host.as_str(), config.port)).unwrap_or_else(|e| {
        fail(&format!("cannot listen on {}:{}: {}", config.host, config.port, e))
    });
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| fail(&e.to_string()));
    println!("Starting server at {}...", output::address(addr));

    let mut sched = Scheduler::new();
    let root = sched.new_task(demo::server(listener, config.read_chunk, max_clients));
    drive(&mut sched, "serve");

    match root.result() {
        Ok(Ok(value)) => println!(
            "{} served {} client(s)",
            output::status_pass(),
            value.as_int().unwrap_or(0)
        ),
        Ok(Err(e)) => fail(&format!("server task failed: {}", e)),
        Err(e) => fail(&e.to_string()),
    }
}

fn cmd_request(config: &DemoConfig) {
    let addr = config.socket_addr().unwrap_or_else(|e| fail(&e));
    println!(
        "Sending {} request(s) to {}...",
        config.requests,
        output::address(addr)
    );

    let mut sched = Scheduler::new();
    let root = sched.new_task(demo::requests(addr, config.requests));
    drive(&mut sched, "request");

    let joined = match root.result() {
        Ok(Ok(Value::Joined(joined))) => joined,
        Ok(Ok(other)) => fail(&format!("unexpected result: {:?}", other)),
        Ok(Err(e)) => fail(&format!("request task failed: {}", e)),
        Err(e) => fail(&e.to_string()),
    };

    let mut failed = 0;
    for (id, result) in &joined {
        match result {
            Ok(value) => {
                let bytes = value.clone().into_bytes().unwrap_or_default();
                println!(
                    "  {} {} {} bytes: {}",
                    output::status_pass(),
                    output::task_label(id),
                    bytes.len(),
                    output::preview(&bytes)
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} {} {}", output::status_fail(), output::task_label(id), e);
            }
        }
    }

    println!();
    if failed == 0 {
        println!("{}", output::banner_ok("request"));
    } else {
        println!("{}", output::banner_fail("request", failed));
    }
    println!(
        "{}, {}",
        output::passed_count(joined.len() - failed),
        output::failed_count(failed)
    );
    if failed > 0 {
        process::exit(1);
    }
}

fn cmd_echo() {
    let listener =
        TcpServer::bind("127.0.0.1:0").unwrap_or_else(|e| fail(&format!("cannot listen: {}", e)));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| fail(&e.to_string()));

    let mut sched = Scheduler::new();
    let server = sched.new_task(demo::echo_server(listener, demo::ECHO_PAYLOAD.len()));
    let client = sched.new_task(demo::echo_client(addr, demo::ECHO_PAYLOAD.to_vec()));
    drive(&mut sched, "echo");

    report(&server, "server");
    report(&client, "client");

    let echoed = client
        .result()
        .ok()
        .and_then(|r| r.ok())
        .and_then(|v| v.into_bytes().ok());
    if echoed.as_deref() == Some(&demo::ECHO_PAYLOAD[..]) {
        println!("{}", output::banner_ok("echo"));
    } else {
        println!("{}", output::banner_fail("echo", 1));
        process::exit(1);
    }
}

/// Run the scheduler to completion; integrity failures end the process.
fn drive(sched: &mut Scheduler, phase: &str) {
    if let Err(e) = sched.run() {
        report_runtime_error(phase, &e);
        process::exit(1);
    }
    let parked = sched.parked_tasks();
    if !parked.is_empty() {
        eprintln!(
            "{}: {} task(s) never resumed: {:?}",
            output::warning_label(),
            parked.len(),
            parked
        );
    }
}

fn report(task: &Task, role: &str) {
    match task.result() {
        Ok(Ok(value)) => println!(
            "  {} {} {} finished with {}",
            output::status_pass(),
            role,
            output::task_label(task.id()),
            value.kind()
        ),
        Ok(Err(e)) => println!(
            "  {} {} {} failed: {}",
            output::status_fail(),
            role,
            output::task_label(task.id()),
            e
        ),
        Err(e) => println!("  {} {} {}", output::status_fail(), role, e),
    }
}

fn report_runtime_error(phase: &str, err: &RuntimeError) {
    let kind = if err.is_integrity() { "integrity" } else { "misuse" };
    eprintln!("{}: {} aborted ({}): {}", output::error_label(), phase, kind, err);
}
