mod biome;
mod catastrophe;
mod climate;
mod health;
mod resource;
mod species;

pub use biome::BiomeSystem;
pub use catastrophe::CatastropheSystem;
pub use climate::ClimateSystem;
pub use health::HealthSystem;
pub use resource::ResourceSystem;
pub use species::SpeciesSystem;
