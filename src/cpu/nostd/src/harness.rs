//! Test Harness
//!
//! runs a statically declared list of test cases on the board, one after another, and reports every step
//! to the host through a [`HostReporter`]. Case bodies return [`CaseResult`]; the `test_assert*` macros
//! return early with an [`Assertion`] so that a failure is attributed to its case instead of aborting the
//! firmware.
//!
//! ```text
//! NotStarted -> SuiteSetup -> { CaseSetup(i) -> CaseBody(i) -> CaseTeardown(i) }* -> SuiteTeardown -> Done
//! ```
//!

use crate::interface::*;
use crate::util::*;
use core::fmt;

/// returned by setup and teardown hooks; the harness follows the most severe status of the
/// application hook and the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Continue,
    /// skip the body of the case (case setup only)
    Ignore,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// a failing case does not stop the remaining cases
    #[default]
    Continue,
    /// stop the suite after the teardown of a failing case
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub enum FailureReason {
    #[default]
    None,
    /// an assertion in a case body did not hold
    Assertion,
    TestSetup,
    CaseSetup,
    CaseTeardown,
    /// at least one case failed
    Cases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct Assertion {
    pub location: Location,
    pub message: MessageString,
}

impl Assertion {
    pub fn new(file: &'static str, line: u32, message: fmt::Arguments) -> Self {
        let mut rendered = MessageString::new();
        let _ = TruncatingWriter(&mut rendered).write_fmt(message);
        Self {
            location: Location { file, line },
            message: rendered,
        }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.location.file, self.location.line, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct Failure {
    pub reason: FailureReason,
    pub assertion: Option<Assertion>,
}

impl Failure {
    pub const fn none() -> Self {
        Self {
            reason: FailureReason::None,
            assertion: None,
        }
    }

    pub const fn new(reason: FailureReason) -> Self {
        Self { reason, assertion: None }
    }

    pub fn is_none(&self) -> bool {
        self.reason == FailureReason::None
    }
}

impl From<Assertion> for Failure {
    fn from(assertion: Assertion) -> Self {
        Self {
            reason: FailureReason::Assertion,
            assertion: Some(assertion),
        }
    }
}

pub type CaseResult = Result<(), Assertion>;
pub type CaseBody = fn() -> CaseResult;
pub type TestSetupHandler = fn(number_of_cases: usize) -> Status;
pub type CaseSetupHandler = fn(case: &Case, index: usize) -> Status;
pub type CaseTeardownHandler = fn(case: &Case, outcome: &CaseOutcome) -> Status;
pub type TestTeardownHandler = fn(outcome: &Outcome);

#[derive(Clone, Copy)]
pub struct Case {
    pub name: &'static str,
    pub setup: Option<CaseSetupHandler>,
    pub body: CaseBody,
    pub teardown: Option<CaseTeardownHandler>,
    pub failure_policy: FailurePolicy,
}

impl Case {
    pub const fn new(name: &'static str, body: CaseBody) -> Self {
        Self {
            name,
            setup: None,
            body,
            teardown: None,
            failure_policy: FailurePolicy::Continue,
        }
    }

    pub const fn with_handlers(
        name: &'static str,
        setup: CaseSetupHandler,
        body: CaseBody,
        teardown: CaseTeardownHandler,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            name,
            setup: Some(setup),
            body,
            teardown: Some(teardown),
            failure_policy,
        }
    }
}

impl fmt::Debug for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case")
            .field("name", &self.name)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

pub struct Specification<'a> {
    pub setup: Option<TestSetupHandler>,
    pub cases: &'a [Case],
    pub teardown: Option<TestTeardownHandler>,
}

impl<'a> Specification<'a> {
    pub const fn new(setup: TestSetupHandler, cases: &'a [Case], teardown: TestTeardownHandler) -> Self {
        Self {
            setup: Some(setup),
            cases,
            teardown: Some(teardown),
        }
    }

    pub const fn from_cases(cases: &'a [Case]) -> Self {
        Self {
            setup: None,
            cases,
            teardown: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct CaseOutcome {
    pub passed: usize,
    pub failed: usize,
    pub failure: Failure,
}

impl CaseOutcome {
    fn fail(&mut self, failure: Failure) {
        self.passed = 0;
        self.failed = 1;
        if self.failure.is_none() {
            self.failure = failure;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct Outcome {
    pub passed: usize,
    pub failed: usize,
    pub failure: Failure,
}

impl Outcome {
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.failure.is_none()
    }
}

/// process exit status of a test program: 0 on success, non-zero otherwise
pub fn exit_status(all_passed: bool) -> i32 {
    (!all_passed) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteState {
    NotStarted,
    SuiteSetup,
    CaseSetup(usize),
    CaseBody(usize),
    CaseTeardown(usize),
    SuiteTeardown,
    Done,
}

pub struct Harness<'s, 'a> {
    specification: &'s Specification<'a>,
    state: SuiteState,
    passed: usize,
    failed: usize,
    failure: Failure,
    /// outcome of the case currently between setup and teardown
    current: CaseOutcome,
}

impl<'s, 'a> Harness<'s, 'a> {
    pub fn new(specification: &'s Specification<'a>) -> Self {
        Self {
            specification,
            state: SuiteState::NotStarted,
            passed: 0,
            failed: 0,
            failure: Failure::none(),
            current: CaseOutcome::default(),
        }
    }

    /// run the whole specification, returning whether every case passed
    pub fn run(specification: &Specification, reporter: &mut impl HostReporter) -> bool {
        let mut harness = Harness::new(specification);
        harness.run_to_completion(reporter).all_passed()
    }

    pub fn run_to_completion(&mut self, reporter: &mut impl HostReporter) -> Outcome {
        while self.step(reporter) != SuiteState::Done {}
        self.outcome()
    }

    pub fn state(&self) -> SuiteState {
        self.state
    }

    pub fn outcome(&self) -> Outcome {
        Outcome {
            passed: self.passed,
            failed: self.failed,
            failure: self.failure.clone(),
        }
    }

    /// execute the action of the current state and move to the next one
    pub fn step(&mut self, reporter: &mut impl HostReporter) -> SuiteState {
        let cases = self.specification.cases;
        self.state = match self.state {
            SuiteState::NotStarted => SuiteState::SuiteSetup,
            SuiteState::SuiteSetup => {
                let status = self
                    .specification
                    .setup
                    .map_or(Status::Continue, |setup| setup(cases.len()))
                    .max(reporter.suite_started(cases));
                if status == Status::Abort {
                    // none of the cases can pass any more
                    self.failed = cases.len();
                    self.failure = Failure::new(FailureReason::TestSetup);
                    SuiteState::SuiteTeardown
                } else if cases.is_empty() {
                    SuiteState::SuiteTeardown
                } else {
                    SuiteState::CaseSetup(0)
                }
            }
            SuiteState::CaseSetup(index) => {
                let case = &cases[index];
                self.current = CaseOutcome::default();
                let status = case
                    .setup
                    .map_or(Status::Continue, |setup| setup(case, index))
                    .max(reporter.case_started(case, index));
                match status {
                    Status::Continue => SuiteState::CaseBody(index),
                    Status::Ignore => SuiteState::CaseTeardown(index),
                    Status::Abort => {
                        self.current.fail(Failure::new(FailureReason::CaseSetup));
                        SuiteState::CaseTeardown(index)
                    }
                }
            }
            SuiteState::CaseBody(index) => {
                match (cases[index].body)() {
                    Ok(()) => self.current.passed = 1,
                    Err(assertion) => self.current.fail(assertion.into()),
                }
                SuiteState::CaseTeardown(index)
            }
            SuiteState::CaseTeardown(index) => {
                let case = &cases[index];
                let mut status = case
                    .teardown
                    .map_or(Status::Continue, |teardown| teardown(case, &self.current));
                if status == Status::Abort {
                    self.current.fail(Failure::new(FailureReason::CaseTeardown));
                }
                status = status.max(reporter.case_finished(case, &self.current));
                self.passed += self.current.passed;
                self.failed += self.current.failed;
                if self.current.failed > 0 && self.failure.is_none() {
                    self.failure = Failure {
                        reason: FailureReason::Cases,
                        assertion: self.current.failure.assertion.clone(),
                    };
                }
                let stop = status == Status::Abort
                    || (self.current.failed > 0 && case.failure_policy == FailurePolicy::Abort);
                if stop || index + 1 == cases.len() {
                    SuiteState::SuiteTeardown
                } else {
                    SuiteState::CaseSetup(index + 1)
                }
            }
            SuiteState::SuiteTeardown => {
                let outcome = self.outcome();
                if let Some(teardown) = self.specification.teardown {
                    teardown(&outcome);
                }
                reporter.suite_finished(&outcome);
                SuiteState::Done
            }
            SuiteState::Done => SuiteState::Done,
        };
        self.state
    }
}

#[macro_export]
/// fail the current case unless the condition holds
macro_rules! test_assert {
    ($condition:expr $(,)?) => {
        $crate::test_assert!($condition, "Expression Evaluated To FALSE")
    };
    ($condition:expr, $($arg:tt)+) => {
        if !$condition {
            return Err($crate::harness::Assertion::new(file!(), line!(), format_args!($($arg)+)));
        }
    };
}

#[macro_export]
/// fail the current case unless `expected == actual`
macro_rules! test_assert_eq {
    ($expected:expr, $actual:expr $(,)?) => {
        match (&$expected, &$actual) {
            (expected, actual) => {
                if !(*expected == *actual) {
                    return Err($crate::harness::Assertion::new(
                        file!(),
                        line!(),
                        format_args!("Expected {:?} Was {:?}", expected, actual),
                    ));
                }
            }
        }
    };
}

#[macro_export]
/// fail the current case unless `expected != actual`
macro_rules! test_assert_ne {
    ($expected:expr, $actual:expr $(,)?) => {
        match (&$expected, &$actual) {
            (expected, actual) => {
                if *expected == *actual {
                    return Err($crate::harness::Assertion::new(
                        file!(),
                        line!(),
                        format_args!("Expected Not-Equal {:?} Was {:?}", expected, actual),
                    ));
                }
            }
        }
    };
}

#[macro_export]
/// unconditionally fail the current case
macro_rules! test_fail {
    ($($arg:tt)+) => {
        return Err($crate::harness::Assertion::new(file!(), line!(), format_args!($($arg)+)))
    };
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        /// application hooks are plain function pointers, so they log through a thread-local
        static APP_LOGS: RefCell<Vec<String>> = RefCell::new(vec![]);
    }

    fn app_log(message: String) {
        APP_LOGS.with(|logs| logs.borrow_mut().push(message));
    }

    fn app_test_setup(number_of_cases: usize) -> Status {
        app_log(format!("app_test_setup({number_of_cases})"));
        Status::Continue
    }

    fn app_case_setup(case: &Case, index: usize) -> Status {
        app_log(format!("app_case_setup({}, {index})", case.name));
        Status::Continue
    }

    fn app_case_teardown(case: &Case, outcome: &CaseOutcome) -> Status {
        app_log(format!("app_case_teardown({}, {}, {})", case.name, outcome.passed, outcome.failed));
        Status::Continue
    }

    fn app_test_teardown(outcome: &Outcome) {
        app_log(format!("app_test_teardown({}, {})", outcome.passed, outcome.failed));
    }

    fn pass_a() -> CaseResult {
        app_log("pass_a()".to_string());
        test_assert_eq!(0, 0);
        Ok(())
    }

    fn pass_b() -> CaseResult {
        app_log("pass_b()".to_string());
        test_assert!(1 + 1 == 2);
        test_assert_ne!(1, 2);
        Ok(())
    }

    fn fail_a() -> CaseResult {
        app_log("fail_a()".to_string());
        test_assert_eq!(0, 1);
        app_log("unreachable".to_string());
        Ok(())
    }

    fn fail_b() -> CaseResult {
        app_log("fail_b()".to_string());
        test_fail!("always fails with {}", 42);
    }

    macro_rules! app_case {
        ($body:ident) => {
            Case::with_handlers(
                stringify!($body),
                app_case_setup,
                $body,
                app_case_teardown,
                FailurePolicy::Continue,
            )
        };
        ($body:ident, $policy:expr) => {
            Case::with_handlers(stringify!($body), app_case_setup, $body, app_case_teardown, $policy)
        };
    }

    /// forwards everything into the same log as the application hooks so the interleaving is visible
    pub struct RecordingReporter {
        pub verbose: bool,
        pub suite_status: Status,
        pub case_status: Status,
        pub teardown_status: Status,
        pub outcome: Option<Outcome>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            APP_LOGS.with(|logs| logs.borrow_mut().clear());
            Self {
                verbose: true,
                suite_status: Status::Continue,
                case_status: Status::Continue,
                teardown_status: Status::Continue,
                outcome: None,
            }
        }
        pub fn check(&mut self, messages: &[&str]) {
            let logs = APP_LOGS.with(|logs| std::mem::take(&mut *logs.borrow_mut()));
            if self.verbose {
                for message in logs.iter() {
                    println!("{}", message);
                }
            }
            assert_eq!(logs, messages);
            if self.verbose {
                println!("[checked]");
            }
        }
    }

    impl HostReporter for RecordingReporter {
        fn suite_started(&mut self, cases: &[Case]) -> Status {
            app_log(format!("suite_started({})", cases.len()));
            self.suite_status
        }
        fn case_started(&mut self, case: &Case, index: usize) -> Status {
            app_log(format!("case_started({}, {index})", case.name));
            self.case_status
        }
        fn case_finished(&mut self, case: &Case, outcome: &CaseOutcome) -> Status {
            app_log(format!(
                "case_finished({}, {}, {}, {:?})",
                case.name, outcome.passed, outcome.failed, outcome.failure.reason
            ));
            self.teardown_status
        }
        fn suite_finished(&mut self, outcome: &Outcome) {
            app_log(format!("suite_finished({}, {})", outcome.passed, outcome.failed));
            self.outcome = Some(outcome.clone());
        }
    }

    #[test]
    fn harness_runs_in_declaration_order() {
        // cargo test harness_runs_in_declaration_order -- --nocapture
        let cases = [app_case!(pass_a), app_case!(pass_b)];
        let specification = Specification::new(app_test_setup, &cases, app_test_teardown);
        let mut reporter = RecordingReporter::new();
        assert!(Harness::run(&specification, &mut reporter));
        reporter.check(&[
            "app_test_setup(2)",
            "suite_started(2)",
            "app_case_setup(pass_a, 0)",
            "case_started(pass_a, 0)",
            "pass_a()",
            "app_case_teardown(pass_a, 1, 0)",
            "case_finished(pass_a, 1, 0, None)",
            "app_case_setup(pass_b, 1)",
            "case_started(pass_b, 1)",
            "pass_b()",
            "app_case_teardown(pass_b, 1, 0)",
            "case_finished(pass_b, 1, 0, None)",
            "app_test_teardown(2, 0)",
            "suite_finished(2, 0)",
        ]);
        let outcome = reporter.outcome.unwrap();
        assert_eq!((outcome.passed, outcome.failed), (2, 0));
        assert_eq!(exit_status(outcome.all_passed()), 0);
    }

    #[test]
    fn harness_state_machine() {
        // cargo test harness_state_machine -- --nocapture
        let cases = [Case::new("pass_a", pass_a), Case::new("fail_a", fail_a)];
        let specification = Specification::from_cases(&cases);
        let mut reporter = RecordingReporter::new();
        let mut harness = Harness::new(&specification);
        assert_eq!(harness.state(), SuiteState::NotStarted);
        let mut states = vec![];
        loop {
            let state = harness.step(&mut reporter);
            states.push(state);
            if state == SuiteState::Done {
                break;
            }
        }
        assert_eq!(
            states,
            [
                SuiteState::SuiteSetup,
                SuiteState::CaseSetup(0),
                SuiteState::CaseBody(0),
                SuiteState::CaseTeardown(0),
                SuiteState::CaseSetup(1),
                SuiteState::CaseBody(1),
                SuiteState::CaseTeardown(1),
                SuiteState::SuiteTeardown,
                SuiteState::Done,
            ]
        );
        // stepping a finished harness is a no-op
        assert_eq!(harness.step(&mut reporter), SuiteState::Done);
        assert_eq!(harness.outcome().failed, 1);
    }

    #[test]
    fn harness_continue_on_failure() {
        // cargo test harness_continue_on_failure -- --nocapture
        let cases = [
            app_case!(fail_a),
            app_case!(pass_a),
            app_case!(fail_b),
            app_case!(pass_b),
        ];
        let specification = Specification::from_cases(&cases);
        let mut reporter = RecordingReporter::new();
        reporter.verbose = false;
        assert!(!Harness::run(&specification, &mut reporter));
        let logs = APP_LOGS.with(|logs| logs.borrow().clone());
        for body in ["fail_a()", "pass_a()", "fail_b()", "pass_b()"] {
            assert!(logs.iter().any(|log| log == body), "{body} did not run");
        }
        assert!(!logs.iter().any(|log| log == "unreachable"));
        let outcome = reporter.outcome.clone().unwrap();
        assert_eq!((outcome.passed, outcome.failed), (2, 2));
        assert_eq!(outcome.failure.reason, FailureReason::Cases);
        let assertion = outcome.failure.assertion.unwrap();
        assert_eq!(assertion.message.as_str(), "Expected 0 Was 1");
        assert!(assertion.location.file.ends_with("harness.rs"));
        assert_eq!(exit_status(false), 1);
    }

    #[test]
    fn harness_failure_count_matches() {
        // cargo test harness_failure_count_matches -- --nocapture
        for failing in 0..5 {
            let mut cases = vec![];
            for index in 0..5 {
                cases.push(if index < failing {
                    Case::new("fail_b", fail_b)
                } else {
                    Case::new("pass_a", pass_a)
                });
            }
            let specification = Specification::from_cases(&cases);
            let mut reporter = RecordingReporter::new();
            reporter.verbose = false;
            let outcome = Harness::new(&specification).run_to_completion(&mut reporter);
            assert_eq!(outcome.failed, failing);
            assert_eq!(outcome.passed, 5 - failing);
            assert_eq!(exit_status(outcome.all_passed()) == 0, failing == 0);
        }
    }

    #[test]
    fn harness_abort_policy() {
        // cargo test harness_abort_policy -- --nocapture
        let cases = [
            app_case!(pass_a),
            app_case!(fail_a, FailurePolicy::Abort),
            app_case!(pass_b),
        ];
        let specification = Specification::from_cases(&cases);
        let mut reporter = RecordingReporter::new();
        assert!(!Harness::run(&specification, &mut reporter));
        reporter.check(&[
            "suite_started(3)",
            "app_case_setup(pass_a, 0)",
            "case_started(pass_a, 0)",
            "pass_a()",
            "app_case_teardown(pass_a, 1, 0)",
            "case_finished(pass_a, 1, 0, None)",
            "app_case_setup(fail_a, 1)",
            "case_started(fail_a, 1)",
            "fail_a()",
            "app_case_teardown(fail_a, 0, 1)",
            "case_finished(fail_a, 0, 1, Assertion)",
            "suite_finished(1, 1)",
        ]);
    }

    #[test]
    fn harness_suite_setup_abort() {
        // cargo test harness_suite_setup_abort -- --nocapture
        let cases = [app_case!(pass_a), app_case!(pass_b)];
        let specification = Specification::from_cases(&cases);
        let mut reporter = RecordingReporter::new();
        reporter.suite_status = Status::Abort;
        assert!(!Harness::run(&specification, &mut reporter));
        reporter.check(&["suite_started(2)", "suite_finished(0, 2)"]);
        assert_eq!(reporter.outcome.unwrap().failure.reason, FailureReason::TestSetup);
    }

    #[test]
    fn harness_case_setup_status() {
        // cargo test harness_case_setup_status -- --nocapture
        let cases = [Case::new("pass_a", pass_a)];
        let specification = Specification::from_cases(&cases);
        // ignored: the body is skipped and the case counts neither way
        let mut reporter = RecordingReporter::new();
        reporter.case_status = Status::Ignore;
        assert!(Harness::run(&specification, &mut reporter));
        reporter.check(&[
            "suite_started(1)",
            "case_started(pass_a, 0)",
            "case_finished(pass_a, 0, 0, None)",
            "suite_finished(0, 0)",
        ]);
        // aborted: the body is skipped, the case fails but its teardown still runs
        let mut reporter = RecordingReporter::new();
        reporter.case_status = Status::Abort;
        assert!(!Harness::run(&specification, &mut reporter));
        reporter.check(&[
            "suite_started(1)",
            "case_started(pass_a, 0)",
            "case_finished(pass_a, 0, 1, CaseSetup)",
            "suite_finished(0, 1)",
        ]);
    }

    #[test]
    fn harness_empty_specification() {
        // cargo test harness_empty_specification -- --nocapture
        let specification = Specification::from_cases(&[]);
        let mut reporter = RecordingReporter::new();
        assert!(Harness::run(&specification, &mut reporter));
        reporter.check(&["suite_started(0)", "suite_finished(0, 0)"]);
    }

    #[test]
    fn harness_assertion_message_truncated() {
        // cargo test harness_assertion_message_truncated -- --nocapture
        fn long_failure() -> CaseResult {
            test_assert!(false, "{}", "x".repeat(500));
            Ok(())
        }
        let error = long_failure().unwrap_err();
        assert_eq!(error.message.len(), MESSAGE_MAX_LENGTH);
        assert!(format!("{error}").contains("harness.rs:"));
    }
}
