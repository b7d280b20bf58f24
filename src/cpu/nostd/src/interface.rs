//! Interface between the board programs and the board
//!
//! Provides the blink loop with a digital output and a way to wait, and provides the test harness with
//! a character channel to the host and a reporter that forwards results to the host.
//!

use crate::harness::*;
use crate::util::*;

/// a single boolean hardware line, e.g. an LED
pub trait OutputPin {
    /// drive the line to the given level
    fn write(&mut self, level: bool);

    /// the level the line is currently driven to
    fn read(&self) -> bool;

    fn toggle(&mut self) {
        let level = self.read();
        self.write(!level);
    }
}

pub trait Sleeper {
    /// suspend the caller for at least `duration` milliseconds; not cancellable
    fn sleep_ms(&mut self, duration: Millis);
}

/// character channel between the device under test and the host test orchestrator
pub trait HostChannel: Write {
    /// blocks until the next byte from the host is available;
    /// returns `None` once the channel is closed and nothing will ever arrive
    fn read_byte(&mut self) -> Option<u8>;
}

/// the host-reporting layer of the test harness; the harness calls these after the application hooks
pub trait HostReporter {
    /// the suite is about to run `cases` in order
    fn suite_started(&mut self, cases: &[Case]) -> Status;

    /// `case` (the `index`-th of the suite) is about to run its body
    fn case_started(&mut self, case: &Case, index: usize) -> Status;

    /// `case` has finished, whether it passed or not
    fn case_finished(&mut self, case: &Case, outcome: &CaseOutcome) -> Status;

    /// all cases have finished; `outcome` is the aggregate
    fn suite_finished(&mut self, outcome: &Outcome);
}
