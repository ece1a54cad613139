//! output formatting utilities for scriptable CLI output
//!
//! uses JSON-RPC 2.0 format for machine-readable output:
//! - success: {"jsonrpc": "2.0", "result": {...}, "id": null}
//! - error: {"jsonrpc": "2.0", "error": {"code": N, "message": "...", "data": {...}}, "id": null}

use serde::Serialize;
use std::io::IsTerminal;

use crate::conditions::{GroupOutcome, Issue};
use crate::context::{Browser, Device};

/// JSON-RPC version constant
const JSONRPC_VERSION: &str = "2.0";

/// output mode determines how results are formatted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// human-readable text output
    Text,
    /// machine-readable JSON-RPC 2.0 output
    Json,
    /// no output on success (errors still go to stderr)
    Quiet,
}

impl OutputMode {
    /// determine output mode from CLI flags and environment
    ///
    /// priority: quiet > json > no_json > auto-detect
    pub fn from_flags(json: bool, no_json: bool, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        if json {
            return Self::Json;
        }
        if no_json {
            return Self::Text;
        }
        // auto-detect: JSON when stdout is not a TTY (piped)
        if !std::io::stdout().is_terminal() {
            Self::Json
        } else {
            Self::Text
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::Quiet)
    }
}

/// JSON-RPC 2.0 success response
#[derive(Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub result: T,
    /// null for CLI responses (no request id)
    pub id: Option<String>,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result,
            id: None,
        }
    }
}

/// JSON-RPC 2.0 error response
#[derive(Serialize)]
pub struct JsonRpcError {
    pub jsonrpc: &'static str,
    pub error: RpcError,
    pub id: Option<String>,
}

/// JSON-RPC 2.0 error object
#[derive(Serialize)]
pub struct RpcError {
    /// error code (exit code, offset by -32000 for app-specific errors)
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

/// additional error data
#[derive(Serialize)]
pub struct ErrorData {
    /// one entry per problem, e.g. each failing rule check
    pub details: Vec<String>,
}

impl JsonRpcError {
    /// create error with standard JSON-RPC error code range
    /// uses -32000 to -32099 for application errors (per JSON-RPC spec)
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            error: RpcError {
                code: to_jsonrpc_code(code),
                message: message.into(),
                data: None,
            },
            id: None,
        }
    }

    pub fn with_details(code: i32, message: impl Into<String>, details: Vec<String>) -> Self {
        let mut error = Self::new(code, message);
        if !details.is_empty() {
            error.error.data = Some(ErrorData { details });
        }
        error
    }
}

/// convert exit code to JSON-RPC error code
/// JSON-RPC reserves -32000 to -32099 for server/application errors
fn to_jsonrpc_code(exit_code: i32) -> i32 {
    -32000 - exit_code
}

// ============================================================================
// Result data structures for different commands
// ============================================================================

/// result data for eval
#[derive(Serialize)]
pub struct EvalData {
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<GroupOutcome>>,
}

/// result data for check
#[derive(Serialize)]
pub struct CheckData {
    pub valid: bool,
    pub groups: usize,
    pub conditions: usize,
    pub issues: Vec<Issue>,
}

/// result data for detect
#[derive(Serialize)]
pub struct DetectData {
    pub device: Device,
    pub browser: Browser,
}

// ============================================================================
// Output functions
// ============================================================================

/// print JSON-RPC success response to stdout
pub fn print_json<T: Serialize>(data: &T) {
    let response = JsonRpcResponse::new(data);
    if let Ok(json) = serde_json::to_string(&response) {
        println!("{}", json);
    }
}

/// print JSON-RPC error to stdout
pub fn print_json_error(code: i32, message: &str) {
    let error = JsonRpcError::new(code, message);
    if let Ok(json) = serde_json::to_string(&error) {
        println!("{}", json);
    }
}

/// print JSON-RPC error with per-problem details
pub fn print_json_error_with_details(code: i32, message: &str, details: Vec<String>) {
    let error = JsonRpcError::with_details(code, message, details);
    if let Ok(json) = serde_json::to_string(&error) {
        println!("{}", json);
    }
}
