use std::process::ExitCode;

fn main() -> ExitCode {
    match mdltex::cli::run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => mdltex::cli::report_error(&e),
    }
}
