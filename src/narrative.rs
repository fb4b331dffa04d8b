//! Turns raw event records into short story beats for the game layer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::events::{EventObserver, EventRecord, SimEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Notable,
    Major,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub time: f64,
    pub severity: Severity,
    pub headline: String,
}

/// Headline for the events worth telling; routine chatter yields `None`.
pub fn headline(event: &SimEvent) -> Option<(Severity, String)> {
    let beat = match event {
        SimEvent::SeasonChanged { to, .. } => (Severity::Minor, format!("{to} arrives")),
        SimEvent::BiomeTransitionStarted { region, from, to, forced, .. } => {
            let cause = if *forced { "is being reshaped" } else { "begins to shift" };
            (Severity::Minor, format!("Region {} {cause} from {from} to {to}", region.0))
        }
        SimEvent::BiomeTransitionCompleted { region, to, .. } => {
            (Severity::Notable, format!("Region {} has become {to}", region.0))
        }
        SimEvent::ResourceDepleted { region, kind } => (
            Severity::Notable,
            format!("{kind} has run out in region {}", region.0),
        ),
        SimEvent::SpeciesExtinction { key, .. } => (Severity::Major, format!("The last of the {key} are gone")),
        SimEvent::MigrationTriggered {
            key,
            destination: Some(destination),
            ..
        } => (
            Severity::Minor,
            format!("Crowded {key} start moving toward region {}", destination.0),
        ),
        SimEvent::CatastropheTriggered {
            kind,
            epicenter,
            intensity,
            ..
        } => {
            let severity = if *intensity >= 0.7 {
                Severity::Major
            } else {
                Severity::Notable
            };
            (severity, format!("A {kind} strikes region {}", epicenter.0))
        }
        SimEvent::CatastropheEnded { kind, .. } => (Severity::Notable, format!("The {kind} subsides")),
        SimEvent::CatastropheResolved { kind, .. } => {
            (Severity::Notable, format!("The land has recovered from the {kind}"))
        }
        SimEvent::HealthCritical { indicator, score } => {
            let subject = indicator.map_or_else(|| "the ecosystem".to_string(), |i| i.name().replace('_', " "));
            (Severity::Major, format!("Alarm: {subject} has collapsed to {score:.2}"))
        }
        SimEvent::HealthWarning { indicator, score } => {
            let subject = indicator.map_or_else(|| "the ecosystem".to_string(), |i| i.name().replace('_', " "));
            (Severity::Notable, format!("Warning: {subject} is weakening ({score:.2})"))
        }
        _ => return None,
    };
    Some(beat)
}

/// Bounded story log. Clones share the same buffer.
#[derive(Debug, Clone)]
pub struct Chronicle {
    entries: Arc<Mutex<VecDeque<StoryRecord>>>,
    capacity: usize,
    min_severity: Severity,
}

impl Chronicle {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            min_severity: Severity::Minor,
        }
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn entries(&self) -> Vec<StoryRecord> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// The `n` most recent entries, oldest first.
    pub fn latest(&self, n: usize) -> Vec<StoryRecord> {
        let entries = self.entries();
        let skip = entries.len().saturating_sub(n);
        entries.into_iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventObserver for Chronicle {
    fn name(&self) -> &str {
        "chronicle"
    }

    fn notify(&mut self, record: &EventRecord) -> Result<()> {
        let Some((severity, headline)) = headline(&record.event) else {
            return Ok(());
        };
        if severity < self.min_severity {
            return Ok(());
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("chronicle lock poisoned"))?;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(StoryRecord {
            time: record.time,
            severity,
            headline,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::catastrophe::CatastropheKind;
    use crate::components::climate::SeasonType;
    use crate::components::species::SpeciesId;
    use crate::events::EngineKind;
    use crate::spatial::RegionId;

    fn record(event: SimEvent) -> EventRecord {
        EventRecord {
            time: 12.0,
            source: EngineKind::Species,
            event,
        }
    }

    #[test]
    fn extinction_is_a_major_beat() {
        let mut chronicle = Chronicle::new(8);
        chronicle
            .notify(&record(SimEvent::SpeciesExtinction {
                species: SpeciesId(0),
                key: "dodo".into(),
            }))
            .unwrap();
        let entries = chronicle.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Major);
        assert!(entries[0].headline.contains("dodo"));
        assert_eq!(entries[0].time, 12.0);
    }

    #[test]
    fn routine_events_are_skipped() {
        let mut chronicle = Chronicle::new(8);
        chronicle
            .notify(&record(SimEvent::HealthAssessed {
                overall: 0.7,
                resilience: 0.6,
            }))
            .unwrap();
        assert!(chronicle.is_empty());
    }

    #[test]
    fn severity_filter_and_capacity_apply() {
        let mut chronicle = Chronicle::new(2).with_min_severity(Severity::Notable);
        chronicle
            .notify(&record(SimEvent::SeasonChanged {
                from: SeasonType::Spring,
                to: SeasonType::Summer,
            }))
            .unwrap();
        assert!(chronicle.is_empty());
        for id in 0..3 {
            chronicle
                .notify(&record(SimEvent::CatastropheTriggered {
                    id,
                    kind: CatastropheKind::Flood,
                    epicenter: RegionId(id as u32),
                    intensity: 0.9,
                    radius: 2.0,
                    duration: 60.0,
                }))
                .unwrap();
        }
        let latest = chronicle.latest(5);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1].headline, "A flood strikes region 2");
    }
}
