mod app;
mod classify;
mod cluster;
mod io;
mod markers;
mod patch;
mod render;
mod tree;

use app::{AppConfig, CloneTreeApp};
use clap::Parser;

fn main() {
    let _ = env_logger::builder().format_timestamp(None).try_init();

    let config = AppConfig::parse();
    if let Err(err) = CloneTreeApp::run(&config) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
