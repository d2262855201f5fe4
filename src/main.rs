use std::process::ExitCode;

fn main() -> ExitCode {
    autoaccept_lib::run()
}
