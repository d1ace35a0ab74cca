//! Binary entrypoint that launches the relay server.

use std::process::ExitCode;

use airwise_relay::start_airwise_relay;

fn main() -> ExitCode {
    start_airwise_relay::run()
}
