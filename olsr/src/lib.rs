pub mod concepts;
pub mod feedback;
pub mod framework;
pub mod mpr;
pub mod router;
pub mod rtable;
#[cfg(feature = "serde")]
pub mod snapshot;
pub mod state;
pub mod timer;
pub mod util;
