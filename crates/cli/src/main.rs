use std::process::ExitCode;

fn main() -> ExitCode {
    winquote_cli::run()
}
