//! Host Test Session
//!
//! The host half of the greentea protocol for a single run of a board program: it issues the `__sync`
//! token, decodes every byte the board prints and keeps track of what the board declared and reported.
//!

use crate::util::*;
use greentea_nostd::greentea::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostTestResult {
    Success,
    Failure,
    /// the board ran past the timeout it declared during the handshake
    Timeout,
    /// the board stopped talking before it reported `end`
    Incomplete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub started: bool,
    pub finished: bool,
    pub passed: usize,
    pub failed: usize,
    /// failure lines the board printed while this case was running
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostTestReport {
    pub sync_token: String,
    /// the board echoed our token
    pub synced: bool,
    pub version: Option<String>,
    /// in seconds
    pub timeout: Option<u64>,
    pub host_test_name: Option<String>,
    pub testcase_count: Option<usize>,
    pub cases: Vec<CaseReport>,
    pub summary: Option<SummaryReport>,
    pub end: Option<String>,
    pub exit: Option<i32>,
    pub timed_out: bool,
    /// broken frames and frames whose value could not be understood
    pub frame_errors: usize,
    pub unknown_keys: Vec<String>,
}

pub struct HostTestSession {
    parser: KvParser,
    /// raw bytes of the current line of board output, used to pick up failure lines
    line: Vec<u8>,
    current_case: Option<usize>,
    pub report: HostTestReport,
}

impl Default for HostTestSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTestSession {
    pub fn new() -> Self {
        Self::with_token(random_name_16())
    }

    pub fn with_token(token: String) -> Self {
        Self {
            parser: KvParser::new(),
            line: Vec::new(),
            current_case: None,
            report: HostTestReport {
                sync_token: token,
                ..Default::default()
            },
        }
    }

    /// what the host sends to start the handshake
    pub fn sync_frame(&self) -> String {
        format!("{{{{{KEY_SYNC};{}}}}}\n", self.report.sync_token)
    }

    /// whether the board ever took part in the protocol; plain programs like blinky never do
    pub fn is_greentea(&self) -> bool {
        self.report.synced || self.report.version.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.report.exit.is_some()
    }

    pub fn timeout_ns(&self) -> Option<u64> {
        self.report.timeout.map(|seconds| seconds.saturating_mul(1_000_000_000))
    }

    pub fn mark_timed_out(&mut self) {
        self.report.timed_out = true;
    }

    pub fn feed_str(&mut self, output: &str) {
        for byte in output.bytes() {
            self.feed(byte);
        }
    }

    pub fn feed(&mut self, byte: u8) {
        if byte == b'\n' {
            let line = std::mem::take(&mut self.line);
            self.handle_line(String::from_utf8_lossy(&line).trim_end_matches('\r'));
        } else {
            self.line.push(byte);
        }
        match self.parser.feed(byte) {
            Some(Ok(message)) => self.handle(message.key.as_str(), message.value.as_str()),
            Some(Err(_)) => self.report.frame_errors += 1,
            None => {}
        }
    }

    fn handle_line(&mut self, line: &str) {
        let is_failure = line.contains(":FAIL: ") || line.starts_with(">>> ");
        if let (true, Some(index)) = (is_failure, self.current_case) {
            self.report.cases[index].failures.push(line.to_string());
        }
    }

    fn case_index(&mut self, name: &str) -> usize {
        match self.report.cases.iter().position(|case| case.name == name) {
            Some(index) => index,
            None => {
                self.report.cases.push(CaseReport {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.report.cases.len() - 1
            }
        }
    }

    fn handle(&mut self, key: &str, value: &str) {
        match key {
            KEY_SYNC => self.report.synced = value == self.report.sync_token,
            KEY_VERSION => self.report.version = Some(value.to_string()),
            KEY_TIMEOUT => match value.parse() {
                Ok(timeout) => self.report.timeout = Some(timeout),
                Err(_) => self.report.frame_errors += 1,
            },
            KEY_HOST_TEST_NAME => self.report.host_test_name = Some(value.to_string()),
            KEY_TESTCASE_COUNT => match value.parse() {
                Ok(count) => self.report.testcase_count = Some(count),
                Err(_) => self.report.frame_errors += 1,
            },
            KEY_TESTCASE_NAME => {
                self.case_index(value);
            }
            KEY_TESTCASE_START => {
                let index = self.case_index(value);
                self.report.cases[index].started = true;
                self.current_case = Some(index);
            }
            KEY_TESTCASE_FINISH => {
                // `name;passed;failed`
                let mut fields = value.rsplitn(3, ';');
                let failed = fields.next().and_then(|field| field.parse().ok());
                let passed = fields.next().and_then(|field| field.parse().ok());
                match (fields.next(), passed, failed) {
                    (Some(name), Some(passed), Some(failed)) => {
                        let index = self.case_index(name);
                        let case = &mut self.report.cases[index];
                        case.finished = true;
                        case.passed = passed;
                        case.failed = failed;
                    }
                    _ => self.report.frame_errors += 1,
                }
                self.current_case = None;
            }
            KEY_TESTCASE_SUMMARY => {
                let mut fields = value.split(';').map(|field| field.parse());
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(Ok(passed)), Some(Ok(failed)), None) => {
                        self.report.summary = Some(SummaryReport { passed, failed })
                    }
                    _ => self.report.frame_errors += 1,
                }
            }
            KEY_END => self.report.end = Some(value.to_string()),
            KEY_EXIT => match value.parse() {
                Ok(code) => self.report.exit = Some(code),
                Err(_) => self.report.frame_errors += 1,
            },
            _ => self.report.unknown_keys.push(key.to_string()),
        }
    }

    pub fn result(&self) -> HostTestResult {
        let report = &self.report;
        if report.timed_out {
            return HostTestResult::Timeout;
        }
        let Some(end) = report.end.as_ref() else {
            return HostTestResult::Incomplete;
        };
        let cases_passed = report.cases.iter().all(|case| case.finished && case.failed == 0);
        let summary_passed = matches!(report.summary, Some(SummaryReport { failed: 0, .. }));
        if report.synced && end == "success" && cases_passed && summary_passed && report.exit.unwrap_or(0) == 0 {
            HostTestResult::Success
        } else {
            HostTestResult::Failure
        }
    }
}
