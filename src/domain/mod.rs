//! Client-side domain model: cart, checkout and the values they share.
pub mod aggregates;
pub mod events;
pub mod value_objects;
