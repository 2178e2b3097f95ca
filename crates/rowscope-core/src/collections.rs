//! Hash containers used for request variables and visit targets.
//!
//! `hashbrown` by default; the `std-hash` feature switches to the standard
//! library maps.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

/// Named values keyed by parameter or variable name.
pub type ValueMap = map::HashMap<String, crate::Value>;

/// A set of client ids.
pub type ClientIdSet = map::HashSet<String>;
