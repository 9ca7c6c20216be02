//! API routes

pub mod live;
pub mod names;
pub mod ops;
