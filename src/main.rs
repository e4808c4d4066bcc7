//! Entry point for the `czip` command-line utility.

mod cli;

use clap::Parser;

fn main() {
    env_logger::init();
    // Usage errors exit 1 like every other failure; help and version
    // output exit 0.
    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };
    if let Err(err) = cli::run(args) {
        eprintln!("czip: {err:#}");
        std::process::exit(1);
    }
}
