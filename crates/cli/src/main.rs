use std::process::ExitCode;

fn main() -> ExitCode {
    specwright_cli::run()
}
