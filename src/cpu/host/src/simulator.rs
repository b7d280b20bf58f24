//! # Embedded Simulator
//!
//! Provides the board symbols that `embedded-demo` links against (`print_char`, `read_char`, `set_leds`,
//! `get_native_time` and `diff_native_time`) so that the board programs run unmodified on a PC.
//! The console is connected to a [`HostTestSession`] which plays the host side of the greentea handshake.
//!
//! Time is virtual by default: every `get_native_time` call advances the clock by `time_step_ns`, so that
//! the busy-wait sleeps of the board finish instantly. Programs that never return (blinky) are stopped
//! once the virtual time passes `max_duration_ms`.
//!

use crate::session::*;
use chrono::Local;
use cty::*;
use derivative::Derivative;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::time::Instant;

#[derive(Serialize, Deserialize, Derivative, Clone, Debug)]
#[derivative(Default)]
pub struct SimulatorConfig {
    /// how far the virtual clock moves on every read of the native timer
    #[derivative(Default(value = "simulator_config_default::time_step_ns()"))]
    #[serde(default = "simulator_config_default::time_step_ns")]
    pub time_step_ns: u64,
    /// stop the program once this much (virtual) time has passed
    #[derivative(Default(value = "simulator_config_default::max_duration_ms()"))]
    #[serde(default = "simulator_config_default::max_duration_ms")]
    pub max_duration_ms: u64,
    /// use the wall clock instead of the virtual clock
    #[derivative(Default(value = "simulator_config_default::realtime()"))]
    #[serde(default = "simulator_config_default::realtime")]
    pub realtime: bool,
    #[derivative(Default(value = "simulator_config_default::verbose()"))]
    #[serde(default = "simulator_config_default::verbose")]
    pub verbose: bool,
    /// print the final report as JSON; the board output then goes to stderr
    #[serde(default)]
    pub json: bool,
    /// forward the board output to the terminal
    #[derivative(Default(value = "true"))]
    #[serde(default = "simulator_config_default::echo")]
    pub echo: bool,
}

pub mod simulator_config_default {
    use crate::util::*;

    pub fn time_step_ns() -> u64 {
        env_usize("SIMULATOR_TIME_STEP_NS", 1000) as u64
    }
    pub fn max_duration_ms() -> u64 {
        env_usize("SIMULATOR_MAX_DURATION_MS", 10_000) as u64
    }
    pub fn realtime() -> bool {
        env_bool("SIMULATOR_REALTIME", "SIMULATOR_VIRTUAL_TIME", false)
    }
    pub fn verbose() -> bool {
        env_is_set("SIMULATOR_VERBOSE")
    }
    pub fn echo() -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// the program returned this exit status
    Returned(i32),
    MaxDuration,
    /// the program ran past the timeout it declared to the host
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub program: String,
    pub started_at: String,
    pub stop: StopReason,
    pub elapsed_ms: f64,
    pub leds: u32,
    pub led_changes: usize,
    /// `None` when the program never took part in the greentea protocol
    pub result: Option<HostTestResult>,
    pub greentea: HostTestReport,
}

impl SimulationReport {
    pub fn exit_code(&self) -> i32 {
        match (self.stop, self.result) {
            (StopReason::Timeout, _) => 1,
            (_, Some(result)) if result != HostTestResult::Success => 1,
            (StopReason::Returned(status), _) => status,
            (StopReason::MaxDuration, _) => 0,
        }
    }

    pub fn print(&self, json: bool) {
        if json {
            match serde_json::to_string(self) {
                Ok(value) => println!("{value}"),
                Err(error) => eprintln!("[simulator] cannot serialize report: {error}"),
            }
            return;
        }
        println!();
        println!("[simulator] program: {}", self.program);
        println!("[simulator] stop: {:?} after {:.3} ms", self.stop, self.elapsed_ms);
        println!("[simulator] leds: {:#b} ({} changes)", self.leds, self.led_changes);
        if let Some(result) = self.result {
            for case in self.greentea.cases.iter() {
                println!(
                    "[simulator] case {}: passed = {}, failed = {}{}",
                    case.name,
                    case.passed,
                    case.failed,
                    if case.finished { "" } else { " (not finished)" }
                );
            }
            println!("[simulator] result: {result:?}");
        }
    }
}

pub struct Simulator {
    pub config: SimulatorConfig,
    pub program: String,
    pub session: HostTestSession,
    /// bytes waiting to be read by the board
    input: VecDeque<u8>,
    time_ns: u64,
    begin: Instant,
    started_at: String,
    /// virtual time when the board declared its timeout
    timeout_start_ns: Option<u64>,
    pub leds: u32,
    pub led_changes: usize,
    /// raw bytes of everything the board printed
    pub output: Vec<u8>,
}

impl Simulator {
    pub fn new(program: &str, config: SimulatorConfig) -> Self {
        let session = HostTestSession::new();
        let input = session.sync_frame().into_bytes().into();
        Self {
            config,
            program: program.to_string(),
            session,
            input,
            time_ns: 0,
            begin: Instant::now(),
            started_at: Local::now().to_rfc3339(),
            timeout_start_ns: None,
            leds: 0,
            led_changes: 0,
            output: Vec::new(),
        }
    }

    /// the terminal reassembles multi-byte characters, so bytes are forwarded as they come
    fn echo(&self, byte: u8) {
        if !self.config.echo {
            return;
        }
        let _ = if self.config.json {
            std::io::stderr().write_all(&[byte])
        } else {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(&[byte])
                .and_then(|_| if byte == b'\n' { stdout.flush() } else { Ok(()) })
        };
    }

    /// the board output decoded as UTF-8
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn print_char(&mut self, byte: u8) {
        self.echo(byte);
        self.output.push(byte);
        self.session.feed(byte);
        if self.timeout_start_ns.is_none() && self.session.report.timeout.is_some() {
            self.timeout_start_ns = Some(self.current_time_ns());
        }
    }

    pub fn print_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.print_char(byte);
        }
    }

    /// negative once the host has nothing more to say, which the board treats as a closed channel
    pub fn read_char(&mut self) -> c_int {
        match self.input.pop_front() {
            Some(byte) => byte as c_int,
            None => -1,
        }
    }

    pub fn set_leds(&mut self, mask: u32) {
        if mask != self.leds {
            self.led_changes += 1;
        }
        self.leds = mask;
        if self.config.verbose {
            println!("[set_leds] mask = {mask} = {mask:#b}");
        }
    }

    fn current_time_ns(&self) -> u64 {
        if self.config.realtime {
            self.begin.elapsed().as_nanos() as u64
        } else {
            self.time_ns
        }
    }

    /// read the native timer, or the reason the program must stop now
    pub fn native_time(&mut self) -> Result<u64, StopReason> {
        if !self.config.realtime {
            self.time_ns += self.config.time_step_ns;
        }
        let now = self.current_time_ns();
        if let (Some(start), Some(timeout)) = (self.timeout_start_ns, self.session.timeout_ns()) {
            if now.saturating_sub(start) > timeout && !self.session.is_finished() {
                self.session.mark_timed_out();
                return Err(StopReason::Timeout);
            }
        }
        if now > self.config.max_duration_ms.saturating_mul(1_000_000) {
            return Err(StopReason::MaxDuration);
        }
        Ok(now)
    }

    pub fn finish(self, stop: StopReason) -> SimulationReport {
        SimulationReport {
            elapsed_ms: self.current_time_ns() as f64 / 1e6,
            result: self.session.is_greentea().then(|| self.session.result()),
            program: self.program,
            started_at: self.started_at,
            stop,
            leds: self.leds,
            led_changes: self.led_changes,
            greentea: self.session.report,
        }
    }
}

lazy_static! {
    static ref BEGIN_TIME: Instant = Instant::now();
    static ref SIMULATOR: Mutex<Option<Simulator>> = Mutex::new(None);
    /// the board symbols are global, so only one program runs at a time
    static ref RUN_LOCK: Mutex<()> = Mutex::new(());
}

/// run a board program against a fresh simulator
pub fn run_program(name: &str, config: SimulatorConfig, program: impl FnOnce() -> c_int) -> SimulationReport {
    let _guard = RUN_LOCK.lock();
    let simulator = Simulator::new(name, config);
    if simulator.config.verbose {
        println!("[simulator] running {name}, sync token {}", simulator.session.report.sync_token);
    }
    *SIMULATOR.lock() = Some(simulator);
    let status = program();
    let simulator = SIMULATOR.lock().take();
    match simulator {
        Some(simulator) => simulator.finish(StopReason::Returned(status)),
        None => unreachable!("the simulator is only removed by the program run that installed it"),
    }
}

/// the board program cannot be unwound from inside a board symbol, so the report is printed here
fn stop_program(simulator: Simulator, stop: StopReason) -> ! {
    let json = simulator.config.json;
    let report = simulator.finish(stop);
    report.print(json);
    std::process::exit(report.exit_code());
}

#[no_mangle]
extern "C" fn print_char(c: c_char) {
    match SIMULATOR.lock().as_mut() {
        Some(simulator) => simulator.print_char(c as u8),
        None => {
            let _ = std::io::stdout().write_all(&[c as u8]);
        }
    }
}

#[no_mangle]
extern "C" fn read_char() -> c_int {
    match SIMULATOR.lock().as_mut() {
        Some(simulator) => simulator.read_char(),
        None => -1,
    }
}

#[no_mangle]
extern "C" fn set_leds(mask: uint32_t) {
    match SIMULATOR.lock().as_mut() {
        Some(simulator) => simulator.set_leds(mask),
        None => println!("[set_leds] mask = {mask} = {mask:#b}"),
    }
}

#[no_mangle]
extern "C" fn get_native_time() -> uint64_t {
    let mut locked = SIMULATOR.lock();
    let Some(simulator) = locked.as_mut() else {
        return BEGIN_TIME.elapsed().as_nanos() as u64;
    };
    match simulator.native_time() {
        Ok(now) => now,
        Err(stop) => match locked.take() {
            Some(simulator) => stop_program(simulator, stop),
            None => unreachable!(),
        },
    }
}

#[no_mangle]
extern "C" fn diff_native_time(start: uint64_t, end: uint64_t) -> c_float {
    end.wrapping_sub(start) as f32 * 1.0e-9
}
