//! Output hardware abstraction types.
//!
//! The driver trait every output backend implements and the channel
//! descriptor the allocator hands out.

pub mod driver;
pub mod types;
