//! # Embedded Simulator
//!
//! Runs the board program selected at build time (`EMBEDDED_DEMO_MAIN`) on the host, with the board
//! symbols provided by [`greentea_host::simulator`].
//!
//! ## Examples
//!
//! ```sh
//! cargo run --release --bin embedded_simulator -- --max-duration-ms 5000
//! EMBEDDED_DEMO_MAIN=tests_base_demo cargo run --release --bin embedded_simulator
//! EMBEDDED_DEMO_MAIN=tests_base_demo cargo run --release --bin embedded_simulator -- --json
//! EMBEDDED_DEMO_MAIN=blinky cargo run --release --bin embedded_simulator -- --realtime --verbose
//! ```
//!

use clap::Parser;
use embedded_demo::{rust_main_raw, RUST_MAIN_NAME};
use greentea_host::simulator::*;

#[derive(Parser, Clone)]
#[clap(author = clap::crate_authors!(", "))]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Embedded Demo Simulator")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
pub struct EmbeddedSimulator {
    /// stop the program after this much simulated time [default: SIMULATOR_MAX_DURATION_MS or 10000]
    #[clap(long)]
    max_duration_ms: Option<u64>,
    /// virtual time that passes on every read of the native timer [default: SIMULATOR_TIME_STEP_NS or 1000]
    #[clap(long)]
    time_step_ns: Option<u64>,
    /// use the wall clock instead of the virtual clock
    #[clap(long, action)]
    realtime: bool,
    /// log every LED change
    #[clap(long, action)]
    verbose: bool,
    /// print the report as JSON on stdout; the board output goes to stderr
    #[clap(long, action)]
    json: bool,
}

impl EmbeddedSimulator {
    pub fn config(&self) -> SimulatorConfig {
        let mut config = SimulatorConfig::default();
        if let Some(max_duration_ms) = self.max_duration_ms {
            config.max_duration_ms = max_duration_ms;
        }
        if let Some(time_step_ns) = self.time_step_ns {
            config.time_step_ns = time_step_ns;
        }
        config.realtime |= self.realtime;
        config.verbose |= self.verbose;
        config.json = self.json;
        config
    }

    pub fn run(&self) -> i32 {
        let config = self.config();
        let json = config.json;
        // functions with the C ABI do not implement `FnOnce`
        let report = run_program(RUST_MAIN_NAME, config, || rust_main_raw());
        report.print(json);
        report.exit_code()
    }
}

fn main() {
    std::process::exit(EmbeddedSimulator::parse().run());
}
