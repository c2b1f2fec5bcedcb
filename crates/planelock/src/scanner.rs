//! Per-tick glue from a mapped point to fired roles.

use crate::trigger::{TriggerConfig, TriggerController, TriggerSink};
use crate::zones::{PaintingPack, ZoneRole};

/// What happened on one scanner tick.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScanOutcome {
    /// Zone under the mapped point, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    /// Role fired this tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired: Option<ZoneRole>,
}

impl ScanOutcome {
    fn idle() -> Self {
        Self {
            zone_id: None,
            fired: None,
        }
    }
}

/// Zone lookup plus trigger debounce over a painting pack.
#[derive(Debug, Clone)]
pub struct Scanner {
    pack: PaintingPack,
    trigger: TriggerController,
}

impl Scanner {
    pub fn new(pack: PaintingPack, config: TriggerConfig) -> Self {
        Self {
            pack,
            trigger: TriggerController::new(config),
        }
    }

    pub fn pack(&self) -> &PaintingPack {
        &self.pack
    }

    pub fn trigger(&self) -> &TriggerController {
        &self.trigger
    }

    /// `mapped` is reference-normalized, or `None` when nothing is locked.
    /// Non-finite points and points outside the unit square count as none.
    pub fn update<S: TriggerSink + ?Sized>(
        &mut self,
        mapped: Option<[f64; 2]>,
        now_ms: u64,
        sink: &mut S,
    ) -> ScanOutcome {
        let point = mapped.filter(|p| p.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
        let Some([x, y]) = point else {
            self.trigger.update(None, now_ms);
            return ScanOutcome::idle();
        };

        let zone = self.pack.find_zone(x, y);
        let fired = self.trigger.update(zone, now_ms);
        if let Some(role) = fired {
            sink.trigger(role);
        }
        ScanOutcome {
            zone_id: zone.map(|z| z.id.clone()),
            fired,
        }
    }

    pub fn reset(&mut self) {
        self.trigger.reset();
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(PaintingPack::default(), TriggerConfig::default())
    }
}
