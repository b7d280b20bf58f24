//! Greentea
//!
//! the key-value protocol spoken between a device under test and the host test orchestrator.
//! Every message is a single `{{key;value}}` frame; the key ends at the first `;` and the value runs up to
//! the closing `}}`, so it may contain further `;` separators (e.g. `{{__testcase_finish;name;1;0}}`).
//! Anything outside of a frame is free text that the host prints but otherwise ignores.
//!

use crate::harness::*;
use crate::interface::*;
use crate::util::*;
use core::fmt;

pub const GREENTEA_CLIENT_VERSION: &str = "1.3.0";

pub const KEY_SYNC: &str = "__sync";
pub const KEY_VERSION: &str = "__version";
pub const KEY_TIMEOUT: &str = "__timeout";
pub const KEY_HOST_TEST_NAME: &str = "__host_test_name";
pub const KEY_TESTCASE_COUNT: &str = "__testcase_count";
pub const KEY_TESTCASE_NAME: &str = "__testcase_name";
pub const KEY_TESTCASE_START: &str = "__testcase_start";
pub const KEY_TESTCASE_FINISH: &str = "__testcase_finish";
pub const KEY_TESTCASE_SUMMARY: &str = "__testcase_summary";
pub const KEY_END: &str = "end";
pub const KEY_EXIT: &str = "__exit";

pub fn write_kv(out: &mut impl Write, key: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(out, "{{{{{key};{value}}}}}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvError {
    KeyTooLong,
    ValueTooLong,
    /// a frame was opened but does not follow `{{key;value}}`
    Malformed,
    /// the value is not valid UTF-8
    Encoding,
}

impl fmt::Display for KvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvError::KeyTooLong => write!(f, "key does not fit the parser buffer"),
            KvError::ValueTooLong => write!(f, "value does not fit the parser buffer"),
            KvError::Malformed => write!(f, "malformed key-value frame"),
            KvError::Encoding => write!(f, "value is not valid UTF-8"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvMessage<const N: usize = KV_MAX_LENGTH> {
    pub key: heapless::String<N>,
    pub value: heapless::String<N>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KvState {
    /// outside of a frame
    Idle,
    OpenBrace,
    Key,
    Value,
    CloseBrace,
}

/// byte-fed decoder of `{{key;value}}` frames; never allocates and recovers after every error
#[derive(Debug, Clone)]
pub struct KvParser<const N: usize = KV_MAX_LENGTH> {
    state: KvState,
    key: heapless::String<N>,
    /// raw bytes, validated as UTF-8 once the frame closes
    value: heapless::Vec<u8, N>,
}

impl<const N: usize> Default for KvParser<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> KvParser<N> {
    pub const fn new() -> Self {
        Self {
            state: KvState::Idle,
            key: heapless::String::new(),
            value: heapless::Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.state = KvState::Idle;
        self.key.clear();
        self.value.clear();
    }

    fn error(&mut self, error: KvError) -> Option<Result<KvMessage<N>, KvError>> {
        self.reset();
        Some(Err(error))
    }

    /// like [`Self::error`], but the offending `{` may be the start of the next frame
    fn error_at_brace(&mut self, error: KvError) -> Option<Result<KvMessage<N>, KvError>> {
        self.reset();
        self.state = KvState::OpenBrace;
        Some(Err(error))
    }

    fn finish(&mut self) -> Result<KvMessage<N>, KvError> {
        let key = core::mem::take(&mut self.key);
        let bytes = core::mem::take(&mut self.value);
        self.state = KvState::Idle;
        let text = core::str::from_utf8(&bytes).map_err(|_| KvError::Encoding)?;
        let mut value = heapless::String::new();
        value.push_str(text).map_err(|_| KvError::ValueTooLong)?;
        Ok(KvMessage { key, value })
    }

    /// returns a message when `byte` completes a frame, an error when it breaks one, and `None` otherwise
    pub fn feed(&mut self, byte: u8) -> Option<Result<KvMessage<N>, KvError>> {
        match self.state {
            KvState::Idle => {
                if byte == b'{' {
                    self.state = KvState::OpenBrace;
                }
            }
            KvState::OpenBrace => {
                if byte == b'{' {
                    self.key.clear();
                    self.value.clear();
                    self.state = KvState::Key;
                } else {
                    self.state = KvState::Idle;
                }
            }
            KvState::Key => {
                if byte == b';' {
                    if self.key.is_empty() {
                        return self.error(KvError::Malformed);
                    }
                    self.state = KvState::Value;
                } else if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                    if self.key.push(byte as char).is_err() {
                        return self.error(KvError::KeyTooLong);
                    }
                } else if byte == b'{' {
                    // `{{{key;value}}`: the frame starts at the last two braces
                    if !self.key.is_empty() {
                        return self.error_at_brace(KvError::Malformed);
                    }
                } else {
                    return self.error(KvError::Malformed);
                }
            }
            KvState::Value => {
                // bytes of multi-byte UTF-8 sequences never collide with these ASCII delimiters
                if byte == b'}' {
                    self.state = KvState::CloseBrace;
                } else if byte == b'{' {
                    return self.error_at_brace(KvError::Malformed);
                } else if byte == b'\n' || byte == b'\r' {
                    return self.error(KvError::Malformed);
                } else if self.value.push(byte).is_err() {
                    return self.error(KvError::ValueTooLong);
                }
            }
            KvState::CloseBrace => {
                if byte != b'}' || self.value.is_empty() {
                    return self.error(KvError::Malformed);
                }
                return Some(self.finish());
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    /// the host went away before sending `__sync`
    ChannelClosed,
    /// the channel refused the reply
    Write,
}

impl From<fmt::Error> for HandshakeError {
    fn from(_: fmt::Error) -> Self {
        HandshakeError::Write
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::ChannelClosed => write!(f, "host channel closed before synchronization"),
            HandshakeError::Write => write!(f, "failed to write to the host channel"),
        }
    }
}

/// block until the host sends its `__sync` token; frames with other keys and broken frames are line noise
pub fn wait_for_sync(channel: &mut impl HostChannel) -> Result<KvString, HandshakeError> {
    let mut parser: KvParser = KvParser::new();
    loop {
        let byte = channel.read_byte().ok_or(HandshakeError::ChannelClosed)?;
        if let Some(Ok(message)) = parser.feed(byte) {
            if message.key == KEY_SYNC {
                return Ok(message.value);
            }
        }
    }
}

/// the host handshake: echo the host's sync token, then declare the timeout budget (in seconds)
/// and the host test profile the host should run against this binary
pub fn greentea_setup(
    channel: &mut impl HostChannel,
    timeout: u32,
    host_test_name: &str,
) -> Result<(), HandshakeError> {
    let token = wait_for_sync(channel)?;
    write_kv(channel, KEY_SYNC, token.as_str())?;
    write_kv(channel, KEY_VERSION, GREENTEA_CLIENT_VERSION)?;
    write_kv(channel, KEY_TIMEOUT, timeout)?;
    write_kv(channel, KEY_HOST_TEST_NAME, host_test_name)?;
    Ok(())
}

/// forwards harness events to the host as greentea frames
pub struct GreenteaReporter<C: HostChannel> {
    pub channel: C,
}

impl<C: HostChannel> GreenteaReporter<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    fn status(result: fmt::Result) -> Status {
        match result {
            Ok(()) => Status::Continue,
            Err(_) => Status::Abort,
        }
    }
}

impl<C: HostChannel> HostReporter for GreenteaReporter<C> {
    fn suite_started(&mut self, cases: &[Case]) -> Status {
        let mut result = write_kv(&mut self.channel, KEY_TESTCASE_COUNT, cases.len());
        for case in cases.iter() {
            result = result.and_then(|_| write_kv(&mut self.channel, KEY_TESTCASE_NAME, case.name));
        }
        Self::status(result)
    }

    fn case_started(&mut self, case: &Case, _index: usize) -> Status {
        Self::status(write_kv(&mut self.channel, KEY_TESTCASE_START, case.name))
    }

    fn case_finished(&mut self, case: &Case, outcome: &CaseOutcome) -> Status {
        if let Some(assertion) = outcome.failure.assertion.as_ref() {
            // same shape as a unity failure line so existing log scrapers keep working
            let _ = writeln!(
                self.channel,
                "{}:{}:{}:FAIL: {}",
                assertion.location.file, assertion.location.line, case.name, assertion.message
            );
        } else if !outcome.failure.is_none() {
            let _ = writeln!(self.channel, ">>> '{}' failed with reason '{:?}'", case.name, outcome.failure.reason);
        }
        let finish = writeln!(
            self.channel,
            "{{{{{KEY_TESTCASE_FINISH};{};{};{}}}}}",
            case.name, outcome.passed, outcome.failed
        );
        Self::status(finish)
    }

    fn suite_finished(&mut self, outcome: &Outcome) {
        let passed = outcome.all_passed();
        let summary = writeln!(
            self.channel,
            "{{{{{KEY_TESTCASE_SUMMARY};{};{}}}}}",
            outcome.passed, outcome.failed
        );
        let _ = summary
            .and_then(|_| write_kv(&mut self.channel, KEY_END, if passed { "success" } else { "failure" }))
            .and_then(|_| write_kv(&mut self.channel, KEY_EXIT, exit_status(passed)));
    }
}
