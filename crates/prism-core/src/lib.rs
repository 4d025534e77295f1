//! Prism Core - Domain types and primitives for federation entity mirroring

pub mod endpoints;
pub mod error;
pub mod ids;
pub mod merge;
pub mod models;
pub mod traits;


pub use endpoints::*;
pub use error::*;
pub use ids::*;
pub use merge::*;
pub use models::*;
pub use traits::*;
