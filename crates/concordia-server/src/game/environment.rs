//! Environmental upsets (global warming, nuclear winter).
//!
//! Each upset keeps an accumulator fed from map state every turn and a
//! threshold that rises every time the upset fires.

use rand::Rng;
use tracing::{debug, info};

use crate::config::EnvironmentConfig;
use crate::error::FatalError;
use crate::hooks::{absorb, Simulation};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Upset {
    /// Fed by polluted tiles
    GlobalWarming,
    /// Fed by fallout
    NuclearWinter,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Accumulator {
    accum: u32,
    level: u32,
}

#[derive(Clone, Debug)]
pub struct UpsetTracker {
    warming: Accumulator,
    winter: Accumulator,
    config: EnvironmentConfig,
}

impl UpsetTracker {
    pub fn new(config: EnvironmentConfig) -> Self {
        let level = (config.map_tiles + 499) / 500;
        Self {
            warming: Accumulator { accum: 0, level },
            winter: Accumulator { accum: 0, level },
            config,
        }
    }

    pub fn accumulated(&self, kind: Upset) -> u32 {
        self.slot(kind).accum
    }

    pub fn threshold(&self, kind: Upset) -> u32 {
        self.slot(kind).level
    }

    /// Run one turn of every enabled upset. Returns the upsets that fired.
    pub fn tick<H: Simulation, R: Rng>(
        &mut self,
        hooks: &mut H,
        rng: &mut R,
    ) -> Result<Vec<Upset>, FatalError> {
        let mut fired = Vec::new();
        for (kind, enabled) in [
            (Upset::GlobalWarming, self.config.global_warming),
            (Upset::NuclearWinter, self.config.nuclear_winter),
        ] {
            if enabled && self.tick_one(kind, hooks, rng)? {
                fired.push(kind);
            }
        }
        Ok(fired)
    }

    fn tick_one<H: Simulation, R: Rng>(
        &mut self,
        kind: Upset,
        hooks: &mut H,
        rng: &mut R,
    ) -> Result<bool, FatalError> {
        let tiles = self.config.map_tiles;
        let percent = match kind {
            Upset::GlobalWarming => self.config.global_warming_percent,
            Upset::NuclearWinter => self.config.nuclear_winter_percent,
        };
        let sources = hooks.count_upset_sources(kind);
        let slot = self.slot_mut(kind);

        slot.accum = slot
            .accum
            .saturating_add(sources.saturating_mul(percent) / 100);
        if slot.accum < slot.level {
            slot.accum = 0;
            return Ok(false);
        }
        slot.accum -= slot.level;

        let odds = ((tiles + 19) / 20).max(1);
        if rng.gen_range(0..odds) >= slot.accum {
            debug!(?kind, accum = slot.accum, level = slot.level, "upset building up");
            return Ok(false);
        }

        let map_factor = (f64::from(tiles).sqrt() as u32) / 5;
        let magnitude = map_factor.saturating_add(slot.accum.saturating_mul(5));
        slot.accum = 0;
        slot.level = slot.level.saturating_add((tiles + 999) / 1000);
        let level = slot.level;

        info!(?kind, magnitude, next_level = level, "environmental upset");
        absorb("apply_upset", None, hooks.apply_upset(kind, magnitude))?;
        Ok(true)
    }

    fn slot(&self, kind: Upset) -> &Accumulator {
        match kind {
            Upset::GlobalWarming => &self.warming,
            Upset::NuclearWinter => &self.winter,
        }
    }

    fn slot_mut(&mut self, kind: Upset) -> &mut Accumulator {
        match kind {
            Upset::GlobalWarming => &mut self.warming,
            Upset::NuclearWinter => &mut self.winter,
        }
    }
}
