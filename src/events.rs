//! Outbound simulation events and the observer bus that fans them out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::components::biome::BiomeType;
use crate::components::catastrophe::CatastropheKind;
use crate::components::climate::{SeasonType, WeatherKind};
use crate::components::health::HealthIndicator;
use crate::components::resource::ResourceType;
use crate::components::species::{InteractionRecord, SpeciesId};
use crate::spatial::RegionId;

/// The six engines, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    Climate,
    Biome,
    Resource,
    Species,
    Catastrophe,
    Health,
}

impl EngineKind {
    pub const COUNT: usize = 6;
    pub const ALL: [EngineKind; Self::COUNT] = [
        EngineKind::Climate,
        EngineKind::Biome,
        EngineKind::Resource,
        EngineKind::Species,
        EngineKind::Catastrophe,
        EngineKind::Health,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Climate => "climate",
            EngineKind::Biome => "biome",
            EngineKind::Resource => "resource",
            EngineKind::Species => "species",
            EngineKind::Catastrophe => "catastrophe",
            EngineKind::Health => "health",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    ClimateChanged {
        global_temperature: f32,
        stability: f32,
        atmospheric_co2: f32,
    },
    SeasonChanged {
        from: SeasonType,
        to: SeasonType,
    },
    WeatherFormed {
        id: u64,
        kind: WeatherKind,
        location: (f32, f32),
        intensity: f32,
    },
    WeatherDissipated {
        id: u64,
        kind: WeatherKind,
    },
    BiomeTransitionStarted {
        region: RegionId,
        from: BiomeType,
        to: BiomeType,
        duration: f32,
        forced: bool,
    },
    BiomeTransitionCompleted {
        region: RegionId,
        from: BiomeType,
        to: BiomeType,
    },
    ResourceLevelChanged {
        kind: ResourceType,
        previous: f32,
        ratio: f32,
    },
    ResourceCritical {
        region: RegionId,
        kind: ResourceType,
        availability: f32,
        capacity: f32,
    },
    ResourceDepleted {
        region: RegionId,
        kind: ResourceType,
    },
    ResourceRestored {
        region: RegionId,
        kind: ResourceType,
        availability: f32,
    },
    SpeciesInteraction(InteractionRecord),
    PopulationChanged {
        species: SpeciesId,
        key: String,
        previous: f32,
        current: f32,
    },
    SpeciesExtinction {
        species: SpeciesId,
        key: String,
    },
    MigrationTriggered {
        species: SpeciesId,
        key: String,
        destination: Option<RegionId>,
    },
    CatastropheTriggered {
        id: u64,
        kind: CatastropheKind,
        epicenter: RegionId,
        intensity: f32,
        radius: f32,
        duration: f32,
    },
    CatastropheEnded {
        id: u64,
        kind: CatastropheKind,
    },
    RecoveryProgress {
        id: u64,
        kind: CatastropheKind,
        progress: f32,
    },
    CatastropheResolved {
        id: u64,
        kind: CatastropheKind,
    },
    HealthAssessed {
        overall: f32,
        resilience: f32,
    },
    /// `indicator` is `None` for the overall score.
    HealthWarning {
        indicator: Option<HealthIndicator>,
        score: f32,
    },
    HealthCritical {
        indicator: Option<HealthIndicator>,
        score: f32,
    },
}

impl SimEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SimEvent::ClimateChanged { .. } => "ClimateChanged",
            SimEvent::SeasonChanged { .. } => "SeasonChanged",
            SimEvent::WeatherFormed { .. } => "WeatherFormed",
            SimEvent::WeatherDissipated { .. } => "WeatherDissipated",
            SimEvent::BiomeTransitionStarted { .. } => "BiomeTransitionStarted",
            SimEvent::BiomeTransitionCompleted { .. } => "BiomeTransitionCompleted",
            SimEvent::ResourceLevelChanged { .. } => "ResourceLevelChanged",
            SimEvent::ResourceCritical { .. } => "ResourceCritical",
            SimEvent::ResourceDepleted { .. } => "ResourceDepleted",
            SimEvent::ResourceRestored { .. } => "ResourceRestored",
            SimEvent::SpeciesInteraction(_) => "SpeciesInteraction",
            SimEvent::PopulationChanged { .. } => "PopulationChanged",
            SimEvent::SpeciesExtinction { .. } => "SpeciesExtinction",
            SimEvent::MigrationTriggered { .. } => "MigrationTriggered",
            SimEvent::CatastropheTriggered { .. } => "CatastropheTriggered",
            SimEvent::CatastropheEnded { .. } => "CatastropheEnded",
            SimEvent::RecoveryProgress { .. } => "RecoveryProgress",
            SimEvent::CatastropheResolved { .. } => "CatastropheResolved",
            SimEvent::HealthAssessed { .. } => "HealthAssessed",
            SimEvent::HealthWarning { .. } => "HealthWarning",
            SimEvent::HealthCritical { .. } => "HealthCritical",
        }
    }
}

/// An event stamped with when and where it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: f64,
    pub source: EngineKind,
    pub event: SimEvent,
}

/// Outbox engines push into during a tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventQueue {
    pending: Vec<SimEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: SimEvent) {
        self.pending.push(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn drain(&mut self) -> std::vec::Drain<'_, SimEvent> {
        self.pending.drain(..)
    }
}

pub trait EventObserver {
    fn name(&self) -> &str;
    fn notify(&mut self, record: &EventRecord) -> Result<()>;
}

/// Delivers records to observers in registration order. A failing observer
/// is logged and skipped.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn EventObserver>>,
    published: u64,
    failures: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: impl EventObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Records published so far, whether or not anyone listened.
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn publish(&mut self, record: &EventRecord) {
        self.published += 1;
        for observer in &mut self.observers {
            if let Err(err) = observer.notify(record) {
                self.failures += 1;
                warn!(
                    observer = observer.name(),
                    event = record.event.name(),
                    error = %err,
                    "observer failed"
                );
            }
        }
    }
}

/// Bounded shared buffer of raw records. Clones share the same buffer, so a
/// caller keeps one handle and registers the other.
#[derive(Debug, Clone)]
pub struct EventLog {
    records: Arc<Mutex<VecDeque<EventRecord>>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn records(&self) -> Vec<EventRecord> {
        match self.records.lock() {
            Ok(records) => records.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.event.name() == name)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventObserver for EventLog {
    fn name(&self) -> &str {
        "event_log"
    }

    fn notify(&mut self, record: &EventRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl EventObserver for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn notify(&mut self, _record: &EventRecord) -> Result<()> {
            anyhow::bail!("boom")
        }
    }

    fn record(time: f64) -> EventRecord {
        EventRecord {
            time,
            source: EngineKind::Climate,
            event: SimEvent::SeasonChanged {
                from: SeasonType::Spring,
                to: SeasonType::Summer,
            },
        }
    }

    #[test]
    fn failing_observer_does_not_block_others() {
        let log = EventLog::new(10);
        let mut bus = EventBus::new();
        bus.register(Failing);
        bus.register(log.clone());
        bus.publish(&record(1.0));
        bus.publish(&record(2.0));
        assert_eq!(bus.failures(), 2);
        assert_eq!(bus.published(), 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.count("SeasonChanged"), 2);
    }

    #[test]
    fn log_is_bounded() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.notify(&record(i as f64)).unwrap();
        }
        let times: Vec<f64> = log.records().iter().map(|r| r.time).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn engine_order_follows_dependencies() {
        let mut kinds = vec![EngineKind::Health, EngineKind::Climate, EngineKind::Species];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![EngineKind::Climate, EngineKind::Species, EngineKind::Health]
        );
    }
}
