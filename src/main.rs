use std::process::ExitCode;

use colored::Colorize;

fn main() -> ExitCode {
    // stdout is reserved for resolved documents
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command_line_interface = dictconfig::cli::CommandLineInterface::load();
    match command_line_interface.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
