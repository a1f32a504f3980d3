use std::process::ExitCode;

use extract_pdf::cli;

fn main() -> Result<ExitCode, extract_pdf::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    cli::run(std::env::args_os())
}
