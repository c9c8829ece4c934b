//! API Routes
//!
//! Route handlers organized by functionality.

pub mod display;
pub mod election;
pub mod events;
pub mod foodlists;
pub mod health;
pub mod sources;
