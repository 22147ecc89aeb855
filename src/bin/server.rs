//! Copilot backend server binary.
//! Run with: cargo run --bin copilot-server

use std::process::ExitCode;

use copilot_backend::start;

fn main() -> ExitCode {
    start::run()
}
