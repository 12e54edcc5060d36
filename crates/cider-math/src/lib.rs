//! Cider analytics math utilities.
//!
//! Every function here is pure and total: non-finite inputs are filtered
//! before computing, and empty inputs produce a well-defined neutral result.

pub mod math;

pub use math::descriptive::*;
pub use math::entropy::*;
pub use math::quantile::*;
pub use math::regression::*;
pub use math::round_to;
