use bitflags::bitflags;
pub use core::fmt::Write;
pub use greentea_nostd::interface::*;
pub use greentea_nostd::util::*;

pub mod extern_c {
    use cty::*;

    extern "C" {
        pub fn print_char(c: c_char);
        /// blocks until the host sends a byte; negative once the host channel is closed
        pub fn read_char() -> c_int;
        pub fn set_leds(mask: uint32_t);
        pub fn get_native_time() -> uint64_t;
        pub fn diff_native_time(start: uint64_t, end: uint64_t) -> c_float;
    }
}

bitflags! {
    /// one bit per LED of the board's LED register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(C)]
    pub struct LedMask: u32 {
        const LED1 = 1 << 0;
        const LED2 = 1 << 1;
        const LED3 = 1 << 2;
        const LED4 = 1 << 3;
        const LED5 = 1 << 4;
        const LED6 = 1 << 5;
        const LED7 = 1 << 6;
    }
}

/// sends the UTF-8 bytes of `s`, one `print_char` per byte
pub fn print_string(s: &str) {
    for byte in s.bytes() {
        unsafe { extern_c::print_char(byte as cty::c_char) };
    }
}

pub struct Printer;

impl Write for Printer {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        print_string(s);
        Ok(())
    }
}

#[cfg(feature = "disable_print")]
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "disable_print")]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "disable_print"))]
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        let _ = $crate::binding::Write::write_fmt(&mut $crate::binding::Printer, format_args!($($arg)*));
    }};
}

#[cfg(not(feature = "disable_print"))]
#[macro_export]
macro_rules! println {
    () => ($crate::binding::print_string("\n"));
    ($($arg:tt)*) => {{
        let _ = $crate::binding::Write::write_fmt(&mut $crate::binding::Printer, format_args!($($arg)*));
        $crate::binding::print_string("\n");
    }};
}

/// the LED register is write-only, so the level of every LED is shadowed here
pub struct BoardLeds {
    state: LedMask,
}

impl BoardLeds {
    pub const fn new() -> Self {
        Self { state: LedMask::empty() }
    }

    pub fn state(&self) -> LedMask {
        self.state
    }

    pub fn set(&mut self, mask: LedMask, on: bool) {
        self.state.set(mask, on);
        unsafe { extern_c::set_leds(self.state.bits()) };
    }

    /// take exclusive ownership of the LEDs in `mask` as a single output line
    pub fn pin(self, mask: LedMask) -> BoardLed {
        BoardLed { leds: self, mask }
    }
}

pub struct BoardLed {
    leds: BoardLeds,
    mask: LedMask,
}

impl OutputPin for BoardLed {
    fn write(&mut self, level: bool) {
        self.leds.set(self.mask, level);
    }
    fn read(&self) -> bool {
        self.leds.state().contains(self.mask)
    }
}

pub struct NativeSleeper;

impl Sleeper for NativeSleeper {
    fn sleep_ms(&mut self, duration: Millis) {
        crate::util::sleep_ms(duration);
    }
}

/// the console UART doubles as the greentea channel
pub struct HostSerial;

impl Write for HostSerial {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        print_string(s);
        Ok(())
    }
}

impl HostChannel for HostSerial {
    fn read_byte(&mut self) -> Option<u8> {
        let c = unsafe { extern_c::read_char() };
        if c < 0 {
            None
        } else {
            Some(c as u8)
        }
    }
}
