//! Plain data owned by the engines, one module per concern.

pub mod biome;
pub mod catastrophe;
pub mod climate;
pub mod health;
pub mod resource;
pub mod species;
