//! Custom assertions for testing

/// Assert that two floating point values are approximately equal
pub fn assert_approx_eq(left: f64, right: f64, tolerance: f64) {
    let diff = (left - right).abs();
    assert!(
        diff <= tolerance,
        "Values not approximately equal: {left} != {right} (diff: {diff}, tolerance: {tolerance})"
    );
}
