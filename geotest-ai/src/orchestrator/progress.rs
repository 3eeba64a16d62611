//! Per-run provider progress
//!
//! Progress is synthetic: while a provider call is in flight its percentage
//! grows by a random step on every tick but never passes 95. Settling a call
//! sets it to exactly 100. Every change is published on the event bus.

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

use geotest_common::events::{EventBus, GeoEvent};

use crate::types::ProviderId;

/// Ceiling while a call is still running
pub const IN_FLIGHT_CAP: u8 = 95;
const MIN_STEP: u8 = 5;
const MAX_STEP: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    percent: u8,
    settled: bool,
}

pub struct ProgressTracker {
    run_id: Uuid,
    slots: Mutex<BTreeMap<ProviderId, Slot>>,
    rng: Mutex<StdRng>,
    event_bus: EventBus,
}

impl ProgressTracker {
    pub fn new(run_id: Uuid, providers: &[ProviderId], rng: StdRng, event_bus: EventBus) -> Self {
        let slots = providers
            .iter()
            .map(|id| (*id, Slot { percent: 0, settled: false }))
            .collect();

        Self {
            run_id,
            slots: Mutex::new(slots),
            rng: Mutex::new(rng),
            event_bus,
        }
    }

    /// Advance every unsettled provider by a random step, capped at 95
    pub fn tick(&self) {
        let updates: Vec<(ProviderId, u8)> = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

            let mut advanced = Vec::new();
            for (id, slot) in slots.iter_mut() {
                if slot.settled || slot.percent >= IN_FLIGHT_CAP {
                    continue;
                }
                let step = rng.gen_range(MIN_STEP..=MAX_STEP);
                slot.percent = slot.percent.saturating_add(step).min(IN_FLIGHT_CAP);
                advanced.push((*id, slot.percent));
            }
            advanced
        };

        for (id, percent) in updates {
            self.publish(id, percent);
        }
    }

    /// Mark a provider call as finished (100%)
    pub fn settle(&self, id: ProviderId) {
        {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let slot = slots.entry(id).or_insert(Slot { percent: 0, settled: false });
            if slot.settled {
                return;
            }
            slot.percent = 100;
            slot.settled = true;
        }

        self.publish(id, 100);
    }

    pub fn percent(&self, id: ProviderId) -> Option<u8> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&id).map(|s| s.percent)
    }

    pub fn snapshot(&self) -> BTreeMap<ProviderId, u8> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.iter().map(|(id, s)| (*id, s.percent)).collect()
    }

    pub fn all_settled(&self) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().all(|s| s.settled)
    }

    fn publish(&self, id: ProviderId, percent: u8) {
        self.event_bus.emit_lossy(GeoEvent::ProviderProgress {
            run_id: self.run_id,
            provider: id.display_name().to_string(),
            percent,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn tracker(bus: EventBus) -> ProgressTracker {
        ProgressTracker::new(
            Uuid::new_v4(),
            &ProviderId::CONSENSUS,
            StdRng::seed_from_u64(9),
            bus,
        )
    }

    #[test]
    fn test_ticks_never_exceed_cap() {
        let tracker = tracker(EventBus::new(1000));

        for _ in 0..50 {
            tracker.tick();
            for percent in tracker.snapshot().values() {
                assert!(*percent <= IN_FLIGHT_CAP);
            }
        }

        assert!(tracker.snapshot().values().all(|p| *p == IN_FLIGHT_CAP));
        assert!(!tracker.all_settled());
    }

    #[test]
    fn test_first_tick_step_in_range() {
        let tracker = tracker(EventBus::new(100));
        tracker.tick();
        for percent in tracker.snapshot().values() {
            assert!((MIN_STEP..=MAX_STEP).contains(percent));
        }
    }

    #[test]
    fn test_settle_sets_exactly_100_and_stops_ticking() {
        let tracker = tracker(EventBus::new(100));
        tracker.tick();
        tracker.settle(ProviderId::Anthropic);

        assert_eq!(tracker.percent(ProviderId::Anthropic), Some(100));

        tracker.tick();
        tracker.tick();
        assert_eq!(tracker.percent(ProviderId::Anthropic), Some(100));
        assert!(tracker.percent(ProviderId::OpenAi).unwrap() <= IN_FLIGHT_CAP);

        tracker.settle(ProviderId::OpenAi);
        tracker.settle(ProviderId::Perplexity);
        assert!(tracker.all_settled());
    }

    #[test]
    fn test_progress_events_published() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let tracker = tracker(bus);

        tracker.tick();
        tracker.settle(ProviderId::OpenAi);
        // Settling twice publishes nothing new
        tracker.settle(ProviderId::OpenAi);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(events.len(), 4);
        match events.last() {
            Some(GeoEvent::ProviderProgress { provider, percent, .. }) => {
                assert_eq!(provider, "OpenAI");
                assert_eq!(*percent, 100);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
