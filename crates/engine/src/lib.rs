//! Elasticity engine.
//!
//! Pure, synchronous computation over observations drawn from tabular
//! records. Nothing here performs I/O or suspends. Malformed input fails
//! fast with a `Validation` [`ApiError`](pricelens_core::ApiError); no
//! partial results are returned.

pub mod columns;
pub mod cross;
pub mod observation;
pub mod own_price;
pub mod segment;

pub use columns::{detect_columns, ColumnRoles, GoodColumns};
pub use cross::{compute_cross_elasticity, CrossElasticity};
pub use observation::{observations, sort_by_price, Observation};
pub use own_price::{compute_arc_elasticity, PriceElasticity, UNIT_TOLERANCE};
pub use segment::{
    CrossClass, CrossSegment, DemandClass, ElasticitySegment, PriceSegment, SkipReason,
    SkippedPair,
};
