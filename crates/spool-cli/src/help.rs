// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Help text for CLI commands.

use colored::Colorize;
use crate::output;

pub fn print_usage() {
    println!(
        "{} {} - Cooperative tasks over non-blocking sockets",
        output::title("Spool"),
        output::version(env!("CARGO_PKG_VERSION"))
    );
    println!();
    println!(
        "{}: {} {} {} {}",
        output::section_header("Usage"),
        output::command("spool"),
        output::arg("[--config <file>]"),
        output::arg("<command>"),
        output::arg("[args]")
    );
    println!();
    println!("{}", output::section_header("Demos:"));
    println!("  {} {}   Serve HTTP-ish echo responses", output::command("serve"), output::arg("[addr] [max-clients]"));
    println!("  {} {}   Fire requests and join them", output::command("request"), output::arg("[addr] [count]"));
    println!("  {}                        In-process 8-byte echo round trip", output::command("echo"));
    println!("  {}                        Show this help", output::command("help"));
    println!("  {}                     Show version", output::command("version"));

    println!();
    println!("{}", output::section_header("Options:"));
    println!("  {}   Load host/port/read_chunk/requests from JSON", output::arg("--config <file>"));
    println!();
    println!("Set {} (e.g. {}) to see scheduler logs.", "RUST_LOG".bold(), output::arg("RUST_LOG=spool_rt=debug"));
}

pub fn print_serve_help() {
    println!("{}", output::section_header("Serve"));
    println!();
    println!("Accept connections and spawn one handler task per client. Each");
    println!("handler reads one chunk and answers with a plain-text 200 response");
    println!("that echoes the request, then closes the connection.");
    println!();
    println!("{}: {} {} {}", "Usage".yellow(),
        output::command("spool"),
        output::command("serve"),
        output::arg("[addr] [max-clients]"));
    println!();
    println!("Without {} the server runs until interrupted.", output::arg("max-clients"));
}

pub fn print_request_help() {
    println!("{}", output::section_header("Request"));
    println!();
    println!("Spawn one task per request, join them all and print what each");
    println!("task got back. Failed connections are reported per task.");
    println!();
    println!("{}: {} {} {}", "Usage".yellow(),
        output::command("spool"),
        output::command("request"),
        output::arg("[addr] [count]"));
}

pub fn print_echo_help() {
    println!("{}", output::section_header("Echo"));
    println!();
    println!("Start a server task and a client task on one scheduler. The client");
    println!("writes 8 bytes, the server echoes them back and closes.");
    println!();
    println!("{}: {} {}", "Usage".yellow(),
        output::command("spool"),
        output::command("echo"));
}
