//! Lease management subsystem.
//!
//! # Data Flow
//! ```text
//! acquire:
//!     → manager.try_reserve (capacity CAS)
//!     → manager.create_lease (token + sticky binding)
//!
//! release / sweep / force-expire:
//!     → remove lease from map (exactly one caller wins)
//!     → report outcome to health (release only, never on expiry)
//!     → free probe slot, then capacity
//! ```

pub mod manager;
pub mod sticky;
pub mod token;

pub use manager::{LeaseManager, Released};
pub use sticky::StickyAffinity;
pub use token::{Lease, LeaseOutcome};
