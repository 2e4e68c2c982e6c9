//! TRON Vanity Address Generator CLI
//!
//! Usage:
//!   tron_vanity -p ABC              # Find an address starting with "TABC"
//!   tron_vanity -s xyz -n 5         # Find 5 addresses ending with "xyz"
//!   tron_vanity -p A -s Z --gpu     # Generate candidates on the GPU

use std::process;

use clap::Parser;
use tracing::error;

use tron_vanity::source::list_accelerators;
use tron_vanity::stats::{format_elapsed, format_number};
use tron_vanity::{logging, Config, Controller, FileSink, Hit, Outcome, RunError, RunSummary};

fn main() {
    let config = Config::parse();
    logging::init();

    if config.list_devices {
        print_devices();
        return;
    }

    match run(config) {
        Ok(summary) => {
            print_summary(&summary);
            process::exit(summary.outcome.exit_code());
        }
        Err(e) => {
            error!(error = %e, "search could not start");
            eprintln!("Error: {}", e);
            if let RunError::Source(_) = e {
                eprintln!("Run without --gpu to search on the CPU only.");
            }
            process::exit(1);
        }
    }
}

fn run(config: Config) -> Result<RunSummary, RunError> {
    config.validate()?;
    let sink = FileSink::open(&config.output)?;
    let controller = Controller::new(config.clone(), sink)?;
    let pattern = controller.pattern();

    // Print startup info
    println!("TRON Vanity Address Generator");
    println!("=============================");
    println!("Pattern:      {}", pattern);
    println!(
        "Search space: 58^{} = {}",
        pattern.constrained_len(),
        pattern.estimated_difficulty()
    );
    println!("Difficulty:   {}", pattern.difficulty_description());
    println!("Workers:      {}", config.worker_count());
    println!("Batch size:   {}", config.batch_size);
    println!("Key source:   {}", config.source_description());
    if config.count == 0 {
        println!("Target:       run until interrupted");
    } else {
        println!("Target:       {} address(es)", config.count);
    }
    println!("Output:       {}", config.output.display());
    println!();

    let cancel = controller.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        if cancel.cancel() {
            eprintln!("\nStopping, waiting for workers to finish...");
        }
    }) {
        error!(error = %e, "failed to install Ctrl-C handler");
    }

    println!("Searching... (Press Ctrl+C to stop)\n");
    controller.run()
}

fn print_summary(summary: &RunSummary) {
    println!();
    for (index, hit) in summary.hits.iter().enumerate() {
        print_result(hit, index + 1);
    }

    match summary.outcome {
        Outcome::TargetReached => {
            println!("Target reached! Found {} address(es).", summary.hits_found)
        }
        Outcome::Cancelled => println!("Stopped by user."),
        Outcome::SourceFailed => {
            let reason = summary
                .source_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "key source stopped".into());
            eprintln!("Search aborted: {}", reason);
        }
    }

    let average = if summary.elapsed.as_secs_f64() > 0.0 {
        summary.total_attempts as f64 / summary.elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!("\n--- Final Statistics ---");
    println!("Total keys checked:   {}", format_number(summary.total_attempts));
    println!("Total matches found:  {}", summary.hits_found);
    println!("Time elapsed:         {}", format_elapsed(summary.elapsed));
    println!("Average speed:        {}/s", format_number(average as u64));
    if summary.abandoned_threads > 0 {
        println!("Abandoned threads:    {}", summary.abandoned_threads);
    }
}

fn print_result(hit: &Hit, index: usize) {
    println!("=== Match #{} ===", index);
    println!("Address:     {}", hit.address);
    println!("Private Key: {}", hit.private_key_hex());
    println!("Worker:      {}", hit.worker_id);
    println!();
}

fn print_devices() {
    let devices = list_accelerators();
    if devices.is_empty() {
        if cfg!(feature = "gpu") {
            println!("No OpenCL GPU devices found.");
        } else {
            println!("GPU support is not compiled in; rebuild with `--features gpu`.");
        }
        return;
    }
    println!("Available GPU devices:");
    for (index, name) in devices.iter().enumerate() {
        println!("  [{}] {}", index, name);
    }
}
