//! Codec implementations

pub mod vp9;
