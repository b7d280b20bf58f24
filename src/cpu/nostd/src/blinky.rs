//! Blinky
//!
//! a fixed-period square wave on one output pin: a burst of fast toggles followed by a long pause,
//! with a counter printed once per period so that a serial console can tell the board is alive
//!

use crate::interface::*;
use crate::util::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkConfig {
    /// toggles per burst; an even number leaves the LED at its starting level after each burst
    pub minor_blink_number: usize,
    /// pause after every toggle
    pub minor_blink_delay: Millis,
    /// pause after every burst
    pub major_blink_delay: Millis,
}

impl BlinkConfig {
    pub const fn new() -> Self {
        Self {
            minor_blink_number: 4 * 2,
            minor_blink_delay: 50,
            major_blink_delay: 1000,
        }
    }
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Blinky<P: OutputPin, S: Sleeper> {
    pub led: P,
    pub sleeper: S,
    pub config: BlinkConfig,
    counter: BlinkCount,
}

impl<P: OutputPin, S: Sleeper> Blinky<P, S> {
    /// takes ownership of the pin for the rest of the program and drives it high
    pub fn new(mut led: P, sleeper: S, config: BlinkConfig) -> Self {
        led.write(true);
        Self {
            led,
            sleeper,
            config,
            counter: 0,
        }
    }

    /// the value that the next cycle will print
    pub fn counter(&self) -> BlinkCount {
        self.counter
    }

    pub fn start(&mut self, out: &mut impl Write) {
        // printing is best effort: a broken console must not stop the LED
        let _ = out.write_str("<start>\n");
    }

    /// one outer period, returning the counter value it printed
    pub fn cycle(&mut self, out: &mut impl Write) -> BlinkCount {
        for _ in 0..self.config.minor_blink_number {
            self.led.toggle();
            self.sleeper.sleep_ms(self.config.minor_blink_delay);
        }
        let printed = self.counter;
        let _ = writeln!(out, "Blinky count: {printed}");
        self.counter = self.counter.wrapping_add(1);
        self.sleeper.sleep_ms(self.config.major_blink_delay);
        printed
    }

    pub fn run(&mut self, out: &mut impl Write) -> ! {
        self.start(out);
        loop {
            self.cycle(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn blinky_starts_high() {
        // cargo test blinky_starts_high -- --nocapture
        let mut board = MockBoard::new();
        let blinky = Blinky::new(board.pin(), board.sleeper(), BlinkConfig::default());
        assert!(blinky.led.read());
        assert_eq!(blinky.counter(), 0);
        board.check(&["led(true)"]);
    }

    #[test]
    fn blinky_single_cycle() {
        // cargo test blinky_single_cycle -- --nocapture
        let mut board = MockBoard::new();
        let mut blinky = Blinky::new(board.pin(), board.sleeper(), BlinkConfig::default());
        let mut console = board.console();
        blinky.start(&mut console);
        board.check(&["led(true)", "print(<start>)"]);
        assert_eq!(blinky.cycle(&mut console), 0);
        let mut expected = vec![];
        for index in 0..8 {
            expected.push(format!("led({})", index % 2 == 1));
            expected.push("sleep(50)".to_string());
        }
        expected.push("print(Blinky count: 0)".to_string());
        expected.push("sleep(1000)".to_string());
        board.check(&expected.iter().map(|s| s.as_str()).collect::<Vec<_>>());
        // even number of toggles: back to the starting level
        assert!(blinky.led.read());
    }

    #[test]
    fn blinky_counter_increments() {
        // cargo test blinky_counter_increments -- --nocapture
        let mut board = MockBoard::new();
        board.verbose = false;
        let mut blinky = Blinky::new(board.pin(), board.sleeper(), BlinkConfig::default());
        let mut output = String::new();
        blinky.start(&mut output);
        for expected in 0..20 {
            assert_eq!(blinky.cycle(&mut output), expected);
        }
        assert_eq!(blinky.counter(), 20);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "<start>");
        for (index, line) in lines[1..].iter().enumerate() {
            assert_eq!(*line, format!("Blinky count: {index}"));
        }
        assert_eq!(lines.len(), 21);
    }

    #[test]
    fn blinky_toggles_between_prints() {
        // cargo test blinky_toggles_between_prints -- --nocapture
        for minor_blink_number in [0, 1, 3, 8, 13] {
            let mut board = MockBoard::new();
            board.verbose = false;
            let config = BlinkConfig {
                minor_blink_number,
                minor_blink_delay: 7,
                major_blink_delay: 300,
            };
            let mut blinky = Blinky::new(board.pin(), board.sleeper(), config);
            let mut console = board.console();
            for _ in 0..3 {
                blinky.cycle(&mut console);
            }
            let logs = board.logs.borrow().clone();
            let prints: Vec<usize> = (0..logs.len())
                .filter(|&index| logs[index].starts_with("print(Blinky count"))
                .collect();
            assert_eq!(prints.len(), 3);
            let mut previous = 0;
            for print in prints {
                let toggles = logs[previous..print].iter().filter(|log| log.starts_with("led(")).count();
                let expected = if previous == 0 { minor_blink_number + 1 } else { minor_blink_number };
                assert_eq!(toggles, expected, "N = {minor_blink_number}");
                let short_sleeps = logs[previous..print].iter().filter(|log| *log == "sleep(7)").count();
                assert_eq!(short_sleeps, minor_blink_number);
                previous = print;
            }
            assert_eq!(blinky.led.read(), minor_blink_number * 3 % 2 == 0);
        }
    }

    #[test]
    fn blinky_counter_wraps() {
        // cargo test blinky_counter_wraps -- --nocapture
        let mut board = MockBoard::new();
        board.verbose = false;
        let mut blinky = Blinky::new(board.pin(), board.sleeper(), BlinkConfig::default());
        blinky.counter = BlinkCount::MAX;
        let mut output = String::new();
        assert_eq!(blinky.cycle(&mut output), BlinkCount::MAX);
        assert_eq!(blinky.counter(), 0);
    }

    /// records every pin write, sleep and print in a single log so that their order can be checked
    pub struct MockBoard {
        pub verbose: bool,
        pub logs: Rc<RefCell<Vec<String>>>,
    }

    impl MockBoard {
        pub fn new() -> Self {
            Self {
                verbose: true,
                logs: Rc::new(RefCell::new(vec![])),
            }
        }
        pub fn pin(&self) -> MockPin {
            MockPin {
                level: false,
                logs: self.logs.clone(),
            }
        }
        pub fn sleeper(&self) -> MockSleeper {
            MockSleeper { logs: self.logs.clone() }
        }
        pub fn console(&self) -> MockConsole {
            MockConsole {
                line: String::new(),
                logs: self.logs.clone(),
            }
        }
        pub fn check(&mut self, messages: &[&str]) {
            if self.verbose {
                for message in self.logs.borrow().iter() {
                    println!("{:?}", message);
                }
            }
            assert_eq!(*self.logs.borrow(), messages);
            self.logs.borrow_mut().clear();
            if self.verbose {
                println!("[checked]");
            }
        }
    }

    pub struct MockPin {
        level: bool,
        logs: Rc<RefCell<Vec<String>>>,
    }

    impl OutputPin for MockPin {
        fn write(&mut self, level: bool) {
            self.level = level;
            self.logs.borrow_mut().push(format!("led({level})"));
        }
        fn read(&self) -> bool {
            self.level
        }
    }

    pub struct MockSleeper {
        logs: Rc<RefCell<Vec<String>>>,
    }

    impl Sleeper for MockSleeper {
        fn sleep_ms(&mut self, duration: Millis) {
            self.logs.borrow_mut().push(format!("sleep({duration})"));
        }
    }

    /// logs one entry per complete line, since formatting splits a line into several writes
    pub struct MockConsole {
        line: String,
        logs: Rc<RefCell<Vec<String>>>,
    }

    impl Write for MockConsole {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            for c in s.chars() {
                if c == '\n' {
                    let line = std::mem::take(&mut self.line);
                    self.logs.borrow_mut().push(format!("print({line})"));
                } else {
                    self.line.push(c);
                }
            }
            Ok(())
        }
    }
}
