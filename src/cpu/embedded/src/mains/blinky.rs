use crate::binding::*;
use greentea_nostd::blinky::*;
use konst::{option, primitive::parse_u32, primitive::parse_usize, result::unwrap_ctx};

/*
EMBEDDED_DEMO_MAIN=blinky cargo build --release --target riscv32i-unknown-none-elf --features riscv
EMBEDDED_DEMO_MAIN=blinky cargo run --release --bin embedded_simulator -- --max-duration-ms 5000
*/

/// bit of the LED register driven by this program, 1 << 0 is LED1
pub const PROJECT_LED: u32 = unwrap_ctx!(parse_u32(option::unwrap_or!(option_env!("PROJECT_LED"), "1")));
pub const MINOR_BLINK_NUMBER: usize =
    unwrap_ctx!(parse_usize(option::unwrap_or!(option_env!("MINOR_BLINK_NUMBER"), "8")));
pub const MINOR_BLINK_DELAY_MS: u32 =
    unwrap_ctx!(parse_u32(option::unwrap_or!(option_env!("MINOR_BLINK_DELAY_MS"), "50")));
pub const MAJOR_BLINK_DELAY_MS: u32 =
    unwrap_ctx!(parse_u32(option::unwrap_or!(option_env!("MAJOR_BLINK_DELAY_MS"), "1000")));

pub const BLINK_CONFIG: BlinkConfig = BlinkConfig {
    minor_blink_number: MINOR_BLINK_NUMBER,
    minor_blink_delay: MINOR_BLINK_DELAY_MS,
    major_blink_delay: MAJOR_BLINK_DELAY_MS,
};

pub fn main() -> cty::c_int {
    let led = BoardLeds::new().pin(LedMask::from_bits_truncate(PROJECT_LED));
    let mut blinky = Blinky::new(led, NativeSleeper, BLINK_CONFIG);
    blinky.run(&mut Printer)
}
