mod app;
mod cli;
mod config;
mod core;
mod executors;
mod parser;
mod plugins;
mod reporters;
mod targets;
mod ui;
mod utils;

use clap::Parser;
use std::panic::PanicHookInfo;

/// Crash reports are for panics that end the process. A host worker on a
/// runtime thread is recovered by the scheduler, so it is only logged.
fn install_panic_hook() {
    human_panic::setup_panic!();
    let crash_report = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        if is_main_thread(std::thread::current().name()) {
            crash_report(info);
        } else {
            tracing::error!("Host worker panicked: {}", info);
        }
    }));
}

fn is_main_thread(name: Option<&str>) -> bool {
    name == Some("main")
}

#[tokio::main]
async fn main() {
    install_panic_hook();

    let cli = cli::args::Cli::parse();
    if let Err(err) = app::run(cli).await {
        eprintln!("fatal: {:#}", err);
        std::process::exit(1);
    }
}
