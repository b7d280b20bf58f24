//! board symbols for the RISC-V soft core: every peripheral is a memory-mapped register
//!

use bitflags::bitflags;
use core::ptr::{read_volatile, write_volatile};
use cty::*;
use konst::{option, primitive::parse_u32, result::unwrap_ctx};

pub const LED_REGISTER: usize = 0xF000_0000;
pub const UART_DATA_REGISTER: usize = 0xF100_0000;
pub const UART_STATUS_REGISTER: usize = 0xF100_0004;
/// 64 bit free-running counter, low word first
pub const TIMER_REGISTER: usize = 0xF200_0000;
pub const TIMER_FREQUENCY: u32 = unwrap_ctx!(parse_u32(option::unwrap_or!(option_env!("TIMER_FREQUENCY"), "100000000")));

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartStatus: u32 {
        const TX_FULL = 1 << 0;
        const RX_VALID = 1 << 1;
    }
}

fn uart_status() -> UartStatus {
    UartStatus::from_bits_truncate(unsafe { read_volatile(UART_STATUS_REGISTER as *const u32) })
}

#[no_mangle]
pub extern "C" fn print_char(c: c_char) {
    while uart_status().contains(UartStatus::TX_FULL) {}
    unsafe { write_volatile(UART_DATA_REGISTER as *mut u32, c as u8 as u32) };
}

/// the UART never closes, so this blocks until the host sends something
#[no_mangle]
pub extern "C" fn read_char() -> c_int {
    while !uart_status().contains(UartStatus::RX_VALID) {}
    (unsafe { read_volatile(UART_DATA_REGISTER as *const u32) } & 0xFF) as c_int
}

#[no_mangle]
pub extern "C" fn set_leds(mask: uint32_t) {
    unsafe { write_volatile(LED_REGISTER as *mut u32, mask) };
}

#[no_mangle]
pub extern "C" fn get_native_time() -> uint64_t {
    let low = TIMER_REGISTER as *const u32;
    let high = (TIMER_REGISTER + 4) as *const u32;
    loop {
        // the low word may carry into the high word between the two reads
        let before = unsafe { read_volatile(high) };
        let value = unsafe { read_volatile(low) };
        if unsafe { read_volatile(high) } == before {
            return ((before as u64) << 32) | value as u64;
        }
    }
}

#[no_mangle]
pub extern "C" fn diff_native_time(start: uint64_t, end: uint64_t) -> c_float {
    end.wrapping_sub(start) as f32 / TIMER_FREQUENCY as f32
}
