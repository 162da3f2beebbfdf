//! Shared numeric constants

/// Fixed-point scale for `Px` and `Qty` (4 decimal places)
pub const FIXED_POINT_SCALE: i64 = 10_000;

/// Fixed-point scale as f64
pub const FIXED_POINT_SCALE_F64: f64 = 10_000.0;

/// Basis points per unit
pub const BPS_PER_UNIT: f64 = 10_000.0;

/// Nanoseconds per millisecond
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Nanoseconds per second
pub const NANOS_PER_SEC: u64 = 1_000_000_000;
