use std::process::ExitCode;

fn main() -> ExitCode {
    voicepay_cli::run()
}
