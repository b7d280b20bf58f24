pub mod session;
pub mod simulator;
pub mod util;
