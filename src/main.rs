use std::process::ExitCode;

fn main() -> ExitCode {
    match photo_sorter_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
