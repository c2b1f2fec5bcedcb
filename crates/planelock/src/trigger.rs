//! Cooldown/repeat debounce from zone hits to role events.

use crate::zones::{Zone, ZoneRole};

/// Debounce timing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Minimum gap before a different zone may fire (ms).
    pub cooldown_ms: u64,
    /// Re-fire period while dwelling in the same zone (ms).
    pub repeat_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 150,
            repeat_ms: 650,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerState {
    /// Zone that fired last, cleared whenever no zone is under the cursor.
    pub last_zone_id: Option<String>,
    pub last_fire_ms: Option<u64>,
}

/// Receives fired roles, typically an audio engine.
pub trait TriggerSink {
    fn trigger(&mut self, role: ZoneRole);
}

impl<F: FnMut(ZoneRole)> TriggerSink for F {
    fn trigger(&mut self, role: ZoneRole) {
        self(role)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TriggerController {
    config: TriggerConfig,
    state: TriggerState,
}

impl TriggerController {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            state: TriggerState::default(),
        }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn state(&self) -> &TriggerState {
        &self.state
    }

    /// Feed the zone under the cursor for this tick. Returns the role to
    /// play, if any.
    pub fn update(&mut self, zone: Option<&Zone>, now_ms: u64) -> Option<ZoneRole> {
        let Some(zone) = zone else {
            self.state.last_zone_id = None;
            return None;
        };

        let elapsed = self
            .state
            .last_fire_ms
            .map(|last| now_ms.saturating_sub(last));
        let changed = self.state.last_zone_id.as_deref() != Some(zone.id.as_str());
        let fire = match elapsed {
            None => true,
            Some(dt) if changed => dt >= self.config.cooldown_ms,
            Some(dt) => dt >= self.config.repeat_ms,
        };
        if !fire {
            return None;
        }

        self.state.last_fire_ms = Some(now_ms);
        if changed {
            self.state.last_zone_id = Some(zone.id.clone());
        }
        tracing::debug!("trigger {} ({}) at {} ms", zone.id, zone.role, now_ms);
        Some(zone.role)
    }

    pub fn reset(&mut self) {
        self.state = TriggerState::default();
    }
}
