//! Inbound commands from external collaborators.
//!
//! Commands are validated on submission and queued per owning engine, which
//! drains its queue at the start of its next tick.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::biome::BiomeType;
use crate::components::catastrophe::CatastropheKind;
use crate::components::resource::ResourceType;
use crate::components::species::SpeciesDefinition;
use crate::events::EngineKind;
use crate::spatial::RegionId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    TriggerCatastropheAt {
        kind: CatastropheKind,
        region: RegionId,
        intensity: f32,
    },
    ForceTransition {
        region: RegionId,
        biome: BiomeType,
    },
    SetCatastropheProbability {
        kind: CatastropheKind,
        probability: f32,
    },
    RegisterSpecies(SpeciesDefinition),
    AddResourceSource {
        region: RegionId,
        kind: ResourceType,
        amount: f32,
        quality: f32,
    },
    SetHealthIndicator {
        name: String,
        value: f32,
    },
}

impl Command {
    /// Engine that applies the command.
    pub fn owner(&self) -> EngineKind {
        match self {
            Command::TriggerCatastropheAt { .. } | Command::SetCatastropheProbability { .. } => {
                EngineKind::Catastrophe
            }
            Command::ForceTransition { .. } => EngineKind::Biome,
            Command::RegisterSpecies(_) => EngineKind::Species,
            Command::AddResourceSource { .. } => EngineKind::Resource,
            Command::SetHealthIndicator { .. } => EngineKind::Health,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("region {0:?} does not exist")]
    UnknownRegion(RegionId),
    #[error("region {0:?} is already under an unresolved catastrophe")]
    RegionAffected(RegionId),
    #[error("{field} = {value} is out of range")]
    OutOfRange { field: &'static str, value: f32 },
    #[error("species '{0}' is already registered")]
    DuplicateSpecies(String),
    #[error("species '{id}' is invalid: {reason}")]
    InvalidSpecies { id: String, reason: String },
    #[error("unknown health indicator '{0}'")]
    UnknownIndicator(String),
}

pub(crate) fn unit_range(field: &'static str, value: f32) -> Result<f32, CommandError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(CommandError::OutOfRange { field, value })
    }
}

pub(crate) fn validate_definition(def: &SpeciesDefinition) -> Result<(), CommandError> {
    let invalid = |reason: &str| CommandError::InvalidSpecies {
        id: def.id.clone(),
        reason: reason.to_string(),
    };
    if def.id.trim().is_empty() {
        return Err(invalid("empty id"));
    }
    if !(def.max_population > 0.0) {
        return Err(invalid("max_population must be positive"));
    }
    if !(def.initial_population >= 0.0) {
        return Err(invalid("initial_population must be non-negative"));
    }
    if !def.growth_rate.is_finite() {
        return Err(invalid("growth_rate must be finite"));
    }
    if !(0.0..=1.0).contains(&def.territoriality) || !(0.0..=1.0).contains(&def.aggression) {
        return Err(invalid("territoriality and aggression must lie in [0, 1]"));
    }
    Ok(())
}

/// Pending commands, one queue per owning engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandQueue {
    queues: [Vec<Command>; EngineKind::COUNT],
}

impl CommandQueue {
    pub(crate) fn push(&mut self, command: Command) {
        self.queues[command.owner().index()].push(command);
    }

    /// Queues a command for an engine other than its owner.
    #[cfg(test)]
    pub(crate) fn push_to(&mut self, engine: EngineKind, command: Command) {
        self.queues[engine.index()].push(command);
    }

    pub(crate) fn take(&mut self, owner: EngineKind) -> Vec<Command> {
        std::mem::take(&mut self.queues[owner.index()])
    }

    pub fn pending(&self, owner: EngineKind) -> &[Command] {
        &self.queues[owner.index()]
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
