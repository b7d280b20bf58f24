#![no_std]
#![no_main]

use embedded_demo as _; // import panic handler and board symbols
use riscv_rt::entry;

#[entry]
fn main() -> ! {
    embedded_demo::rust_main()
}
