//! Float assertions shared by the workspace tests.

use assert_float_eq::*;

fn assert_same_len(expected: &[f64], actual: &[f64]) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "slices differ in length: expected {}, got {}",
        expected.len(),
        actual.len()
    );
}

/// Element-wise comparison within `distance` ULPs.
pub fn assert_slice_f64_near(expected: &[f64], actual: &[f64], distance: u32) {
    assert_same_len(expected, actual);
    for (&expected, &actual) in expected.iter().zip(actual) {
        if expected != actual {
            assert_f64_near!(expected, actual, distance);
        }
    }
}

/// Element-wise comparison within a relative `epsilon`.
pub fn assert_slice_f64_relative(expected: &[f64], actual: &[f64], epsilon: f64) {
    assert_same_len(expected, actual);
    for (&expected, &actual) in expected.iter().zip(actual) {
        if expected != actual {
            assert_float_relative_eq!(expected, actual, epsilon);
        }
    }
}
