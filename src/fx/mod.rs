//! Audio degradation effects.

pub mod bitcrusher;
