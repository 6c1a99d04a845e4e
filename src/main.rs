#[macro_use]
extern crate log;

use echoping::{cli::App, report::Summary, session::CancelToken};

fn main() {
    let config = match App::parse_args() {
        Ok(config) => config,
        Err(e) => {
            error!("Could not parse provided argument: {}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        interrupt.cancel();
        trace!("Registered signal interrupt -- Signalling shut down to session");
    }) {
        error!("Could not install interrupt handler: {}", e);
        std::process::exit(1);
    }

    let stats = match echoping::run(config, cancel) {
        Ok(stats) => stats,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    trace!("Successfully ended ping session");

    println!();
    println!("{}", Summary(&stats));
}
