//! Property-based tests for overlay invariants

mod overlay_invariants;
