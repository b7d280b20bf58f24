#![no_std]

pub mod binding;
pub mod util;
pub mod mains {
    automod::dir!(pub "src/mains");
}
#[cfg(feature = "riscv")]
pub mod riscv_board;

pub use binding::*;
#[cfg(feature = "panic_halt")]
use panic_halt as _;

/// run the board program selected at build time with `EMBEDDED_DEMO_MAIN=<name>`, returning its exit status
#[no_mangle]
pub extern "C" fn rust_main_raw() -> cty::c_int {
    include!(concat!(env!("OUT_DIR"), "/embedded_demo_main.name"))
}

pub const RUST_MAIN_NAME: &str = env!("EMBEDDED_DEMO_MAIN_NAME");

#[no_mangle]
pub extern "C" fn rust_main() -> ! {
    let status = rust_main_raw();
    println!("[exit] {status}");
    loop {}
}
