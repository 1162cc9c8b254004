//! Property-based tests for stitching.
//!
//! These tests use proptest to generate fragment sets and verify that the
//! stitched output does not depend on the order in which fragments are found.
