//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 3-9     | data             | Reading, analysing and exporting records |
//! | 10-19   | assistant        | Chat service and credential codes        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into [`api_exit_code`] or the relevant command

use pricelens_core::{ApiError, ErrorKind};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Data (3-9)
// =============================================================================

/// Input file missing, unreadable, or not valid CSV/JSON.
pub const EXIT_DATA_READ: u8 = 3;

/// Dataset refused by the engine: too few rows, missing or non-numeric
/// columns, or the same column picked for both goods.
pub const EXIT_DATA_VALIDATION: u8 = 4;

/// Workbook export failed.
pub const EXIT_DATA_EXPORT: u8 = 5;

// =============================================================================
// Assistant (10-19)
// =============================================================================

/// No API key from flag, keychain or environment. Nothing was sent.
pub const EXIT_AI_MISSING_KEY: u8 = 10;

/// Service rejected the key (HTTP 401).
pub const EXIT_AI_AUTH: u8 = 11;

/// Service unreachable after all retries.
pub const EXIT_AI_NETWORK: u8 = 12;

/// Rate limited after all retries (HTTP 429).
pub const EXIT_AI_RATE_LIMIT: u8 = 13;

/// Service error after all retries (HTTP 5xx).
pub const EXIT_AI_SERVER: u8 = 14;

/// Request rejected (HTTP 400/422) or response unusable (no choices, no file id).
pub const EXIT_AI_REQUEST: u8 = 15;

/// Unexpected status or unparseable response.
pub const EXIT_AI_UNKNOWN: u8 = 16;

/// Call cancelled before completion.
pub const EXIT_AI_CANCELLED: u8 = 17;

/// Exit code for a failed assistant call.
pub fn api_exit_code(err: &ApiError) -> u8 {
    match err.kind {
        ErrorKind::Auth if err.status_code.is_none() => EXIT_AI_MISSING_KEY,
        ErrorKind::Auth => EXIT_AI_AUTH,
        ErrorKind::Network => EXIT_AI_NETWORK,
        ErrorKind::RateLimit => EXIT_AI_RATE_LIMIT,
        ErrorKind::Server => EXIT_AI_SERVER,
        ErrorKind::Validation => EXIT_AI_REQUEST,
        ErrorKind::Unknown => EXIT_AI_UNKNOWN,
        ErrorKind::Cancelled => EXIT_AI_CANCELLED,
    }
}
