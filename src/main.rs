#![allow(missing_docs)]

fn main() -> std::process::ExitCode {
    review_harvester_lib::run()
}
