//! Test harnesses shared with store implementations
