use crate::binding::*;
use crate::println;
use greentea_nostd::greentea::*;
use greentea_nostd::harness::*;
use greentea_nostd::test_assert_eq;
use konst::{option, primitive::parse_u32, result::unwrap_ctx};

/*
EMBEDDED_DEMO_MAIN=tests_base_demo cargo build --release --target riscv32i-unknown-none-elf --features riscv
EMBEDDED_DEMO_MAIN=tests_base_demo cargo run --release --bin embedded_simulator -- --json
*/

/// seconds the host waits for the whole suite before declaring a timeout
pub const GREENTEA_TIMEOUT: u32 = unwrap_ctx!(parse_u32(option::unwrap_or!(option_env!("GREENTEA_TIMEOUT"), "40")));
pub const HOST_TEST_NAME: &str = "default_auto";

//--------------------------------
// test setup functions
//--------------------------------

fn app_test_setup(_number_of_cases: usize) -> Status {
    // common setup code ...
    Status::Continue
}

fn app_case_setup(_case: &Case, _index: usize) -> Status {
    // test setup code ...
    Status::Continue
}

fn app_case_teardown(_case: &Case, _outcome: &CaseOutcome) -> Status {
    // test tear down code ...
    Status::Continue
}

fn app_test_teardown(_outcome: &Outcome) {
    // common tear down code
}

//--------------------------------
// test functions
//--------------------------------

fn test_success_1() -> CaseResult {
    test_assert_eq!(0, 0);
    Ok(())
}

fn test_success_2() -> CaseResult {
    test_assert_eq!(1, 1);
    Ok(())
}

const fn simple_case(name: &'static str, body: CaseBody) -> Case {
    Case::with_handlers(name, app_case_setup, body, app_case_teardown, FailurePolicy::Continue)
}

pub static CASES: [Case; 2] = [
    simple_case("test_success_1", test_success_1),
    simple_case("test_success_2", test_success_2),
];

pub static SPECIFICATION: Specification<'static> = Specification::new(app_test_setup, &CASES, app_test_teardown);

pub fn main() -> cty::c_int {
    let mut serial = HostSerial;
    // the handshake should happen before anything else is sent to the host
    if let Err(error) = greentea_setup(&mut serial, GREENTEA_TIMEOUT, HOST_TEST_NAME) {
        println!("[greentea] handshake failed: {error}");
        return exit_status(false);
    }
    let passed = Harness::run(&SPECIFICATION, &mut GreenteaReporter::new(serial));
    exit_status(passed)
}
