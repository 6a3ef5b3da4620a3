//! # Error Types
//!
//! Two layers of errors:
//!
//! - [`CommandError`] is the uniform, user-visible error every command completes
//!   with. [`CommandError::from_raw`] translates transport-reported errors into
//!   it (status code, in-doubt flag, native call-site fields and a message
//!   rendered from the canonical status table).
//! - [`DispatchError`] covers client-side precondition failures detected before
//!   anything reaches the transport. It converts into a [`CommandError`] with a
//!   client-origin status code, so callers only ever handle one shape.

use std::backtrace::Backtrace;
use std::panic::Location;
use thiserror::Error;

use crate::operation::Operation;
use crate::record::Key;
use crate::status::{StatusCode, STATUS_TOKEN_PREFIX};

/// Result type for command completions.
pub type CommandResult<T> = Result<T, CommandError>;

/// Result type for client-side preconditions and configuration.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Client-side precondition failures. Never sent to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Not connected.")]
    NotConnected,

    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        fields: Vec<&'static str>,
        message: String,
    },

    #[error("Transaction {txn_id} is already complete")]
    TransactionComplete { txn_id: u64 },

    #[error("Transaction capacity exceeded: requested {requested}, reserved {reserved}, budget {budget}")]
    CapacityExceeded {
        requested: u64,
        reserved: u64,
        budget: u64,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DispatchError {
    /// Build an invalid-parameter error naming every offending field.
    pub fn invalid_fields(fields: Vec<&'static str>, reason: &str) -> Self {
        let message = format!("{} {}", fields.join(" and "), reason);
        Self::InvalidParameter { fields, message }
    }

    /// Client-origin status code surfaced when this error reaches a caller.
    pub fn code(&self) -> StatusCode {
        match self {
            DispatchError::NotConnected => StatusCode::ERR_CLUSTER,
            DispatchError::InvalidParameter { .. } => StatusCode::ERR_PARAM,
            DispatchError::TransactionComplete { .. } => StatusCode::ERR_CLIENT,
            DispatchError::CapacityExceeded { .. } => StatusCode::ERR_CLIENT,
            DispatchError::Configuration(_) => StatusCode::ERR_CLIENT,
        }
    }
}

impl From<config::ConfigError> for DispatchError {
    fn from(error: config::ConfigError) -> Self {
        DispatchError::Configuration(error.to_string())
    }
}

/// The command an error originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRef {
    pub operation: Operation,
    pub key: Option<Key>,
}

/// Error as reported by the transport, before translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeError {
    pub code: StatusCode,
    pub message: String,
    pub in_doubt: bool,
    pub func: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl NativeError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn in_doubt(mut self, in_doubt: bool) -> Self {
        self.in_doubt = in_doubt;
        self
    }

    pub fn at(mut self, func: &str, file: &str, line: u32) -> Self {
        self.func = Some(func.to_string());
        self.file = Some(file.to_string());
        self.line = Some(line);
        self
    }
}

/// Error handed to the translator: native, or already translated.
#[derive(Debug, Clone, PartialEq)]
pub enum RawError {
    Native(NativeError),
    Translated(CommandError),
}

impl From<NativeError> for RawError {
    fn from(error: NativeError) -> Self {
        RawError::Native(error)
    }
}

impl From<CommandError> for RawError {
    fn from(error: CommandError) -> Self {
        RawError::Translated(error)
    }
}

/// Call site captured when a command executes with stack traces enabled.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub location: &'static Location<'static>,
    frames: String,
}

impl CallSite {
    /// Snapshot the caller's location and a backtrace.
    #[track_caller]
    pub fn capture() -> Self {
        let location = Location::caller();
        let backtrace = Backtrace::force_capture().to_string();
        Self {
            location,
            frames: caller_frames(&backtrace),
        }
    }

    /// Frames rooted at the original call site.
    pub fn frames(&self) -> String {
        let mut frames = format!(
            "    at {}:{}:{}",
            self.location.file(),
            self.location.line(),
            self.location.column()
        );
        if !self.frames.is_empty() {
            frames.push('\n');
            frames.push_str(&self.frames);
        }
        frames
    }
}

// Drop the frames belonging to the capture machinery itself.
fn caller_frames(backtrace: &str) -> String {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in backtrace.lines() {
        let starts_frame = line
            .trim_start()
            .split_once(':')
            .map(|(index, _)| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        match frames.last_mut() {
            Some(frame) if !starts_frame => frame.push(line),
            _ => frames.push(vec![line]),
        }
    }

    frames
        .into_iter()
        .filter(|frame| {
            let head = frame[0];
            !head.contains("std::backtrace") && !head.contains("CallSite::capture")
        })
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Uniform error a command completes with.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
    pub code: StatusCode,
    pub command: Option<CommandRef>,
    pub func: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub in_doubt: bool,
    /// Stack rewritten to start at the command's call site.
    pub stack: Option<String>,
}

impl CommandError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            command: None,
            func: None,
            file: None,
            line: None,
            in_doubt: false,
            stack: None,
        }
    }

    /// Translate a transport error.
    ///
    /// Returns `None` when there is no error or its code is success. An
    /// already translated error is returned unchanged.
    pub fn from_raw(
        raw: Option<RawError>,
        command: Option<&CommandRef>,
        call_site: Option<&CallSite>,
    ) -> Option<CommandError> {
        let native = match raw? {
            RawError::Translated(error) => return Some(error),
            RawError::Native(native) => native,
        };
        if native.code.is_ok() {
            return None;
        }

        let mut error = CommandError {
            message: format_message(&native.message, native.code),
            code: native.code,
            command: command.cloned(),
            func: native.func,
            file: native.file,
            line: native.line,
            in_doubt: native.in_doubt,
            stack: None,
        };
        if let Some(call_site) = call_site {
            error.splice_stack(call_site);
        }
        Some(error)
    }

    /// Convert a precondition failure, keeping the command context.
    pub fn from_dispatch(
        error: DispatchError,
        command: Option<&CommandRef>,
        call_site: Option<&CallSite>,
    ) -> CommandError {
        let mut translated = CommandError::new(error.code(), error.to_string());
        translated.command = command.cloned();
        if let Some(call_site) = call_site {
            translated.splice_stack(call_site);
        }
        translated
    }

    /// Server-origin errors carry strictly positive codes.
    pub fn is_server_error(&self) -> bool {
        self.code.is_server_code()
    }

    fn splice_stack(&mut self, call_site: &CallSite) {
        self.stack = Some(format!(
            "CommandError: {}\n{}",
            self.message,
            call_site.frames()
        ));
    }
}

impl From<DispatchError> for CommandError {
    fn from(error: DispatchError) -> Self {
        CommandError::from_dispatch(error, None, None)
    }
}

/// Render a native message, replacing the first embedded status token with the
/// canonical description of `code`.
fn format_message(message: &str, code: StatusCode) -> String {
    if message.trim().is_empty() {
        return code.description().to_string();
    }

    match find_status_token(message) {
        Some((start, end)) => {
            let mut rendered = String::with_capacity(message.len());
            rendered.push_str(&message[..start]);
            rendered.push_str(code.description());
            rendered.push_str(&message[end..]);
            rendered
        }
        None => message.to_string(),
    }
}

fn find_status_token(message: &str) -> Option<(usize, usize)> {
    message.match_indices(STATUS_TOKEN_PREFIX).find_map(|(start, prefix)| {
        // Must start a word
        if start > 0 && is_token_byte(message.as_bytes()[start - 1]) {
            return None;
        }
        let tail = &message[start + prefix.len()..];
        let len = tail.bytes().take_while(|b| is_token_byte(*b) && !b.is_ascii_lowercase()).count();
        (len > 0).then(|| (start, start + prefix.len() + len))
    })
}

fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
