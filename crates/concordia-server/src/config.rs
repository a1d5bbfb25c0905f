//! Game configuration

use std::path::Path;
use std::time::Duration;

use concordia_protocol::{PhaseMode, VictoryConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LoadError};

/// Game configuration, usually loaded from a YAML file
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Players required before the lobby may start
    pub min_players: u8,
    /// Player slots available (ids are never reused)
    pub max_players: u8,
    /// Phase layout of a turn
    pub phase_mode: PhaseMode,
    /// Wait for human players even while they are disconnected
    pub turn_blocking: bool,
    /// Turn timer settings
    pub turn_timer: TurnTimerConfig,
    /// Treaty durations and cascade behaviour
    pub diplomacy: DiplomacyConfig,
    /// Enabled victory conditions
    pub victory: VictoryConfig,
    /// Pollution/fallout style upsets
    pub environment: EnvironmentConfig,
    /// Turn to year mapping
    pub calendar: CalendarConfig,
    /// Whether spaceships can be built at all
    pub spacerace: bool,
    /// Last turn of the game (turn-limit victory)
    pub end_turn: u32,
    /// Autosave every N turns (0 = never)
    pub autosave_interval_turns: u32,
    /// Consecutive asset-less checks before a player starts dying
    pub dying_grace_turns: u32,
    /// Chance (percent) per turn that a barbarian unit retires
    pub barbarian_retire_pct: u8,
    pub fog_of_war: bool,
    /// Grace period before AI takeover on disconnect (None = never)
    pub disconnect_grace_secs: Option<u64>,
    /// Seed for barbarian retirement, upsets and acting order
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 1,
            max_players: 32,
            phase_mode: PhaseMode::Concurrent,
            turn_blocking: false,
            turn_timer: TurnTimerConfig::default(),
            diplomacy: DiplomacyConfig::default(),
            victory: VictoryConfig::default(),
            environment: EnvironmentConfig::default(),
            calendar: CalendarConfig::default(),
            spacerace: true,
            end_turn: 5000,
            autosave_interval_turns: 10,
            dying_grace_turns: 0,
            barbarian_retire_pct: 0,
            fog_of_war: true,
            disconnect_grace_secs: None,
            seed: 0,
        }
    }
}

impl GameConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, LoadError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Checks done before the game is allowed to enter `Running`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turn_timer.fixed_length && self.turn_timer.timeout_secs == 0 {
            return Err(ConfigError::FixedLengthWithoutTimeout);
        }
        if self.diplomacy.ceasefire_turns == 0 {
            return Err(ConfigError::ZeroCeasefire);
        }
        if self.victory.turn_limit && self.end_turn == 0 {
            return Err(ConfigError::NoEndTurn);
        }
        if self.victory.spaceship && !self.spacerace {
            return Err(ConfigError::SpaceRaceDisabled);
        }
        if self.victory.culture && self.victory.culture_points <= 0 {
            return Err(ConfigError::CultureFloor(self.victory.culture_points));
        }
        Ok(())
    }
}

/// Turn timer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnTimerConfig {
    /// Maximum wait per phase in seconds (0 = unbounded)
    pub timeout_secs: u32,
    /// Phases always last exactly `timeout_secs`; readiness is ignored
    pub fixed_length: bool,
    /// Extra seconds granted on the first turn
    pub first_turn_extra_secs: u32,
    /// Remaining-time marks at which players are warned
    pub warning_secs: Vec<u32>,
    /// Background tick while waiting for input
    pub tick_interval_ms: u64,
}

impl Default for TurnTimerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            fixed_length: false,
            first_turn_extra_secs: 0,
            warning_secs: vec![30, 10],
            tick_interval_ms: 250,
        }
    }
}

impl TurnTimerConfig {
    /// Time allowed for a phase of the given turn, if bounded
    pub fn phase_timeout(&self, turn: u32) -> Option<Duration> {
        if self.timeout_secs == 0 {
            return None;
        }
        let extra = if turn <= 1 { self.first_turn_extra_secs } else { 0 };
        Some(Duration::from_secs(u64::from(self.timeout_secs + extra)))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// How a third player allied with both sides resolves an expired cease-fire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Cancel only the alliance with the non-teammate (or the higher id)
    #[default]
    CancelOne,
    /// Cancel every alliance that is not a team pact
    CancelBoth,
}

/// Treaty durations
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiplomacyConfig {
    pub ceasefire_turns: u16,
    /// 0 makes signed peace take effect immediately
    pub armistice_turns: u16,
    pub contact_turns: u16,
    pub reason_to_cancel_turns: u8,
    pub cascade: CascadePolicy,
}

impl Default for DiplomacyConfig {
    fn default() -> Self {
        Self {
            ceasefire_turns: 16,
            armistice_turns: 16,
            contact_turns: 10,
            reason_to_cancel_turns: 2,
            cascade: CascadePolicy::CancelOne,
        }
    }
}

/// Environmental upset weighting
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub global_warming: bool,
    pub nuclear_winter: bool,
    /// Weight applied to counted sources, in percent
    pub global_warming_percent: u32,
    pub nuclear_winter_percent: u32,
    /// Map size; scales trigger odds and threshold growth
    pub map_tiles: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            global_warming: true,
            nuclear_winter: true,
            global_warming_percent: 100,
            nuclear_winter_percent: 100,
            map_tiles: 4000,
        }
    }
}

/// Calendar: one fixed step per turn
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub start_year: i32,
    pub year_step: i32,
    /// Whether year 0 exists
    pub year_zero: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            start_year: -4000,
            year_step: 50,
            year_zero: false,
        }
    }
}
