#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

pub mod blinky;
pub mod greentea;
pub mod harness;
pub mod interface;
pub mod util;
