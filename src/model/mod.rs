//! Pure data structures shared by the controller, the provider boundary and the bridge.

pub mod product;
pub mod purchase;

pub use product::*;
pub use purchase::*;
