//! Types shared by the engine, the assistant client and the CLI.
//!
//! One error taxonomy covers domain validation (malformed datasets) and
//! transport failures (HTTP); callers switch on a single enum.

pub mod error;
pub mod record;

pub use error::{ApiError, ErrorCause, ErrorKind};
pub use record::{column_names, CellValue, Record};
