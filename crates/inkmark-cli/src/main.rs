//! `inkmark` command-line entry point.

fn main() {
    env_logger::init();
    log::debug!("Starting inkmark");

    if let Err(error) = inkmark_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
