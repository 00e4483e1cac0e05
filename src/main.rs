use std::process::ExitCode;

fn main() -> ExitCode {
    match coordconv::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("CRITICAL: {}", e);
            ExitCode::FAILURE
        }
    }
}
