//! Turn controller: the top-level game state machine.
//!
//! `Initial -> Running -> Over -> Initial`. One controller owns every piece of
//! game state and is driven by a single task; transports talk to it only
//! through the [`InputHandle`] channel.

use std::time::Duration;

use concordia_protocol::{
    AdminCommand, DiplomaticState, GameState, Inbound, Notification, Order, PhaseMode, PlayerId,
    RejectReason, TeamId, Victory, VictoryKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::GameConfig;
use crate::dispatch::{Disposition, InputDispatcher, InputHandle};
use crate::error::{ConfigError, FatalError, RegistryError, StartError};
use crate::game::{
    active_players, check_victory, phase_count, phase_done, year_for_turn, DiplomacyTable,
    PhaseDriver, ReadinessInput, UpsetTracker, VictoryInputs,
};
use crate::hooks::{absorb, Hooks};
use crate::players::{Multiplier, PlayerRegistry};

/// Policy sliders a player may address.
const MAX_MULTIPLIERS: usize = 64;

/// Result of one `run_turn` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn finished; play the next one
    Continue,
    GameOver(Victory),
    /// Nothing was played because the game is not running
    NotRunning,
}

pub struct TurnController<H> {
    config: GameConfig,
    hooks: H,
    players: PlayerRegistry,
    diplomacy: DiplomacyTable,
    upsets: UpsetTracker,
    dispatcher: InputDispatcher,
    rng: StdRng,
    state: GameState,
    turn: u32,
    phase: usize,
    /// Phase mode in effect for the current turn
    phase_mode: PhaseMode,
    staged_phase_mode: Option<PhaseMode>,
    staged_fog: Option<bool>,
    force_end: bool,
    /// Phase to continue from after loading a partially played turn
    resume_phase: Option<usize>,
    victory: Option<Victory>,
    outbox: Vec<Notification>,
    subscriber: Option<mpsc::UnboundedSender<Notification>>,
}

impl<H: Hooks> TurnController<H> {
    pub fn new(config: GameConfig, hooks: H) -> Self {
        Self {
            players: PlayerRegistry::new(config.max_players),
            diplomacy: DiplomacyTable::new(config.diplomacy.clone()),
            upsets: UpsetTracker::new(config.environment.clone()),
            dispatcher: InputDispatcher::new(),
            rng: StdRng::seed_from_u64(config.seed),
            state: GameState::Initial,
            turn: 0,
            phase: 0,
            phase_mode: config.phase_mode,
            staged_phase_mode: None,
            staged_fog: None,
            force_end: false,
            resume_phase: None,
            victory: None,
            outbox: Vec::new(),
            subscriber: None,
            config,
            hooks,
        }
    }

    // -- read accessors --

    pub fn input_handle(&self) -> InputHandle {
        self.dispatcher.handle()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn current_state(&self) -> GameState {
        self.state
    }

    pub fn current_turn(&self) -> u32 {
        self.turn
    }

    pub fn current_phase(&self) -> usize {
        self.phase
    }

    pub fn current_year(&self) -> i32 {
        year_for_turn(&self.config.calendar, self.turn.max(1))
    }

    pub fn phase_mode(&self) -> PhaseMode {
        self.phase_mode
    }

    pub fn diplomatic_state(&self, a: PlayerId, b: PlayerId) -> DiplomaticState {
        self.diplomacy.state(a, b)
    }

    pub fn victory(&self) -> Option<&Victory> {
        self.victory.as_ref()
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Scenario and save-game setup.
    pub fn players_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.players
    }

    pub fn diplomacy(&self) -> &DiplomacyTable {
        &self.diplomacy
    }

    /// Scenario and save-game setup.
    pub fn diplomacy_mut(&mut self) -> &mut DiplomacyTable {
        &mut self.diplomacy
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Take the notifications buffered since the last call.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// Stream notifications instead of buffering them.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriber = Some(tx);
        rx
    }

    // -- lifecycle --

    /// Register a player. Mid-game players start acting from the next phase.
    pub fn create_player(
        &mut self,
        name: impl Into<String>,
        is_ai: bool,
        team: Option<TeamId>,
    ) -> Result<PlayerId, RegistryError> {
        let name = name.into();
        let id = self.players.add_player(name.clone(), is_ai, team)?;
        self.diplomacy.sync_players(&self.players);
        if self.state == GameState::Running {
            if let Some(p) = self.players.get_mut(id) {
                p.phase_done = true;
                p.ai_phase_done = true;
            }
        }
        info!(player = %id, %name, is_ai, "player created");
        self.notify(Notification::PlayerCreated { player: id });
        Ok(id)
    }

    pub fn create_barbarian(&mut self, name: impl Into<String>) -> Result<PlayerId, RegistryError> {
        let id = self.players.add_barbarian(name)?;
        self.diplomacy.sync_players(&self.players);
        info!(player = %id, "barbarian player created");
        self.notify(Notification::PlayerCreated { player: id });
        Ok(id)
    }

    /// Leave the lobby. `force` skips the player count and ready checks,
    /// never the configuration checks.
    pub fn start_game(&mut self, force: bool) -> Result<(), StartError> {
        self.check_startable(force)?;
        self.enter_running(1);
        Ok(())
    }

    /// Continue a loaded game at `turn`, inside its partially played `phase`.
    pub fn resume(&mut self, turn: u32, phase: usize) -> Result<(), StartError> {
        self.check_startable(true)?;
        self.enter_running(turn.max(1));
        self.phase = phase;
        self.resume_phase = Some(phase);
        Ok(())
    }

    /// Back to the lobby after a finished game.
    pub fn soft_restart(&mut self) {
        if self.state != GameState::Over {
            return;
        }
        info!("returning to the lobby");
        self.players.reset_for_new_game();
        self.diplomacy = DiplomacyTable::new(self.config.diplomacy.clone());
        self.upsets = UpsetTracker::new(self.config.environment.clone());
        self.dispatcher.clear_queued();
        self.turn = 0;
        self.phase = 0;
        self.resume_phase = None;
        self.force_end = false;
        self.victory = None;
        // Changes made during the last game become the lobby settings.
        if let Some(mode) = self.staged_phase_mode.take() {
            self.phase_mode = mode;
            self.config.phase_mode = mode;
        }
        if let Some(fog) = self.staged_fog.take() {
            self.config.fog_of_war = fog;
        }
        self.set_state(GameState::Initial);
    }

    pub fn force_end_of_phase(&mut self) {
        if self.state == GameState::Running {
            info!(turn = self.turn, phase = self.phase, "phase ended by operator");
            self.force_end = true;
        }
    }

    /// Takes effect at the next turn boundary.
    pub fn set_phase_mode(&mut self, mode: PhaseMode) {
        if self.state == GameState::Initial {
            self.phase_mode = mode;
            self.config.phase_mode = mode;
        } else {
            self.staged_phase_mode = Some(mode);
        }
    }

    /// Takes effect at the start of the next new turn.
    pub fn set_fog_of_war(&mut self, enabled: bool) {
        if self.state == GameState::Initial {
            self.config.fog_of_war = enabled;
        } else {
            self.staged_fog = Some(enabled);
        }
    }

    /// Applies from the next phase on. 0 disables the timeout.
    pub fn set_timeout(&mut self, secs: u32) {
        if secs == 0 && self.config.turn_timer.fixed_length {
            warn!("fixed-length turns need a timeout, keeping the current one");
            return;
        }
        self.config.turn_timer.timeout_secs = secs;
    }

    /// Apply everything already waiting on the input channel.
    pub fn process_pending_input(&mut self) -> Result<(), FatalError> {
        let active = if self.state == GameState::Running {
            let count = phase_count(self.phase_mode, &self.players);
            active_players(self.phase_mode, self.phase.min(count - 1), &self.players)
        } else {
            Vec::new()
        };
        while let Some(event) = self.dispatcher.try_next() {
            self.handle_inbound(event, &active)?;
        }
        self.try_auto_start();
        Ok(())
    }

    /// Wait in the lobby, then play turns until the game is over.
    ///
    /// Returns the victory that ended the game, or `None` if play stopped
    /// without one. The lobby waits for input indefinitely: the controller
    /// owns an input handle itself, so the channel never closes under it.
    pub async fn run(&mut self) -> Result<Option<Victory>, FatalError> {
        while self.state == GameState::Initial {
            if let Some(event) = self.dispatcher.next().await {
                self.handle_inbound(event, &[])?;
            }
            self.try_auto_start();
        }

        let mut is_new_turn = self.resume_phase.is_none();
        loop {
            match self.run_turn(is_new_turn).await? {
                TurnOutcome::Continue => is_new_turn = true,
                TurnOutcome::GameOver(victory) => return Ok(Some(victory)),
                TurnOutcome::NotRunning => return Ok(self.victory.clone()),
            }
        }
    }

    /// Play one full turn.
    ///
    /// Exhausting an identifier space is fatal: an emergency save is
    /// attempted before the error is returned.
    pub async fn run_turn(&mut self, is_new_turn: bool) -> Result<TurnOutcome, FatalError> {
        match self.play_turn(is_new_turn).await {
            Err(FatalError::ResourceExhausted(what)) => {
                error!(%what, "identifier space exhausted, attempting emergency save");
                if let Err(err) = self.hooks.save_game("emergency", true) {
                    error!(%err, "emergency save failed");
                }
                Err(FatalError::ResourceExhausted(what))
            }
            other => other,
        }
    }

    async fn play_turn(&mut self, is_new_turn: bool) -> Result<TurnOutcome, FatalError> {
        if self.state != GameState::Running {
            return Ok(self.stopped_outcome());
        }

        let resumed_phase = self.resume_phase.take();
        if is_new_turn && resumed_phase.is_none() {
            self.begin_turn()?;
        }

        let count = phase_count(self.phase_mode, &self.players);
        self.phase = match resumed_phase {
            Some(phase) if phase >= count => {
                error!(phase, count, "resumed phase out of range, clamped");
                count - 1
            }
            Some(phase) => phase,
            None => 0,
        };
        let mut is_new_phase = resumed_phase.is_none();

        while self.phase < count {
            let active = active_players(self.phase_mode, self.phase, &self.players);
            info!(turn = self.turn, phase = self.phase, of = count, ?active, "phase begins");
            self.notify(Notification::PhaseBegan {
                turn: self.turn,
                phase: self.phase,
                active: active.clone(),
            });

            let mut notes = Vec::new();
            self.driver(&mut notes).begin_phase(&active, is_new_phase)?;
            self.notify_all(notes);
            is_new_phase = true;
            self.flush_queued_input(&active)?;

            self.accept_input(&active).await?;
            if self.state != GameState::Running {
                return Ok(self.stopped_outcome());
            }

            let mut notes = Vec::new();
            self.driver(&mut notes).end_phase(&active)?;
            self.notify_all(notes);
            debug!(turn = self.turn, phase = self.phase, "phase ended");
            self.notify(Notification::PhaseEnded {
                turn: self.turn,
                phase: self.phase,
            });
            self.phase += 1;
        }

        self.end_turn()
    }

    /// New-turn bookkeeping, before the first phase.
    fn begin_turn(&mut self) -> Result<(), FatalError> {
        if let Some(mode) = self.staged_phase_mode.take() {
            info!(%mode, "phase mode changed");
            self.phase_mode = mode;
            self.config.phase_mode = mode;
        }

        let year = self.current_year();
        info!(turn = self.turn, year, "turn begins");
        self.notify(Notification::TurnBegan {
            turn: self.turn,
            year,
        });
        if self.config.victory.turn_limit && self.turn == self.config.end_turn {
            info!(turn = self.turn, "last turn");
            self.notify(Notification::LastTurn { turn: self.turn });
        }

        self.refresh_standing();
        self.retire_barbarians()?;
        for player in self.players.iter_mut() {
            if player.is_alive() && player.is_connected && player.is_human() {
                player.turns_played += 1;
            }
        }
        if let Some(fog) = self.staged_fog.take() {
            info!(fog, "fog of war changed");
            self.config.fog_of_war = fog;
            self.hooks.set_fog_of_war(fog);
        }
        self.players.shuffle_order(&mut self.rng);
        Ok(())
    }

    fn end_turn(&mut self) -> Result<TurnOutcome, FatalError> {
        let notes = self
            .diplomacy
            .tick_turn(self.turn, &self.players, &mut self.hooks)?;
        self.notify_all(notes);
        self.upsets.tick(&mut self.hooks, &mut self.rng)?;

        info!(turn = self.turn, "turn ended");
        self.notify(Notification::TurnEnded { turn: self.turn });

        self.refresh_standing();
        if let Some(victory) = self.evaluate_victory() {
            self.game_over(victory.clone())?;
            return Ok(TurnOutcome::GameOver(victory));
        }

        let completed = self.turn;
        self.turn += 1;
        let interval = self.config.autosave_interval_turns;
        if interval > 0 && completed % interval == 0 {
            debug!(turn = completed, "autosave");
            absorb("save_game", None, self.hooks.save_game("autosave", false))?;
        }
        Ok(TurnOutcome::Continue)
    }

    /// Wait until the phase-done predicate holds, the deadline passes or an
    /// operator ends the phase. Input is applied as it arrives.
    async fn accept_input(&mut self, active: &[PlayerId]) -> Result<(), FatalError> {
        let timer = self.config.turn_timer.clone();
        let deadline = timer.phase_timeout(self.turn).map(|t| Instant::now() + t);
        let mut warnings: Vec<u32> = match deadline {
            Some(_) => {
                let limit = timer.timeout_secs;
                let mut marks: Vec<u32> = timer
                    .warning_secs
                    .iter()
                    .copied()
                    .filter(|&w| w > 0 && w < limit)
                    .collect();
                marks.sort_unstable_by(|a, b| b.cmp(a));
                marks
            }
            None => Vec::new(),
        };
        let mut ticker = time::interval(timer.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            while let Some(event) = self.dispatcher.try_next() {
                self.handle_inbound(event, active)?;
            }
            if self.state != GameState::Running {
                return Ok(());
            }

            let now = Instant::now();
            let timed_out = deadline.is_some_and(|d| now >= d);
            if self.force_end || self.is_phase_done(active, timed_out) {
                if timed_out {
                    info!(turn = self.turn, phase = self.phase, "phase timed out");
                }
                self.force_end = false;
                return Ok(());
            }

            if let Some(d) = deadline {
                let remaining = d.saturating_duration_since(now).as_secs();
                while let Some(&mark) = warnings.first() {
                    if remaining > u64::from(mark) {
                        break;
                    }
                    warnings.remove(0);
                    self.notify(Notification::TimeoutWarning {
                        seconds_remaining: mark,
                    });
                }
            }

            tokio::select! {
                event = self.dispatcher.next() => {
                    if let Some(event) = event {
                        self.handle_inbound(event, active)?;
                    }
                }
                _ = async {
                    match deadline {
                        Some(d) => time::sleep_until(d).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {}
                _ = ticker.tick() => self.on_tick(),
            }
        }
    }

    fn is_phase_done(&self, active: &[PlayerId], timed_out: bool) -> bool {
        let timer = &self.config.turn_timer;
        phase_done(&ReadinessInput {
            players: &self.players,
            active,
            turn_blocking: self.config.turn_blocking,
            fixed_length: timer.fixed_length && timer.timeout_secs > 0,
            timed_out,
        })
    }

    fn on_tick(&mut self) {
        let Some(grace) = self.config.disconnect_grace_secs else {
            return;
        };
        let now = Instant::now().into_std();
        for id in self
            .players
            .process_disconnections(now, Duration::from_secs(grace))
        {
            // The AI missed this phase's first activities; do not wait on it.
            if let Some(p) = self.players.get_mut(id) {
                p.ai_phase_done = true;
            }
            info!(player = %id, "AI takes over disconnected player");
            self.notify(Notification::AiTakeover { player: id });
        }
    }

    fn handle_inbound(&mut self, event: Inbound, active: &[PlayerId]) -> Result<(), FatalError> {
        match InputDispatcher::classify(&event, self.state, &self.players, active) {
            Disposition::Apply => {}
            Disposition::Queue => {
                match event {
                    Inbound::Orders { player, orders } => {
                        debug!(%player, count = orders.len(), "orders queued until the player's phase");
                        self.dispatcher.queue(player, orders);
                    }
                    Inbound::PlayerReady { player } => {
                        debug!(%player, "ready held until the player's phase");
                        self.dispatcher.queue_ready(player);
                    }
                    _ => {}
                }
                return Ok(());
            }
            Disposition::Reject(reason) => {
                self.reject(event.player(), reason);
                return Ok(());
            }
        }

        match event {
            Inbound::Connect { player } => {
                if let Err(err) = self.players.connect(player) {
                    warn!(%player, %err, "connect failed");
                }
                info!(%player, "player connected");
            }
            Inbound::Disconnect { player } => {
                if let Err(err) = self.players.disconnect(player, Instant::now().into_std()) {
                    warn!(%player, %err, "disconnect failed");
                }
                info!(%player, "player disconnected");
                if self.state == GameState::Initial {
                    if let Some(p) = self.players.get_mut(player) {
                        p.ready = p.is_ai;
                    }
                }
                if self.state == GameState::Over && self.players.connected_count() == 0 {
                    self.soft_restart();
                }
            }
            Inbound::PlayerReady { player } => {
                if let Some(p) = self.players.get_mut(player) {
                    match self.state {
                        GameState::Initial => p.ready = true,
                        GameState::Running => p.phase_done = true,
                        GameState::Over => {}
                    }
                }
                debug!(%player, "player ready");
            }
            Inbound::Orders { player, orders } => self.apply_orders(player, orders)?,
            Inbound::Treaty {
                player,
                other,
                action,
            } => {
                match self.diplomacy.apply_action(
                    player,
                    other,
                    action,
                    self.turn,
                    &self.players,
                    &mut self.hooks,
                ) {
                    Ok(notes) => self.notify_all(notes),
                    Err(err) => self.reject(
                        Some(player),
                        RejectReason::TreatyRefused {
                            reason: err.to_string(),
                        },
                    ),
                }
            }
            Inbound::Surrender { player } => {
                if let Some(p) = self.players.get_mut(player) {
                    p.surrendered = true;
                }
                info!(%player, "player surrendered");
                self.notify(Notification::PlayerSurrendered { player });
            }
            Inbound::Admin { command } => self.handle_admin(command)?,
        }
        Ok(())
    }

    fn handle_admin(&mut self, command: AdminCommand) -> Result<(), FatalError> {
        match command {
            AdminCommand::StartGame { force } => {
                match self.start_game(force) {
                    Ok(()) => {}
                    Err(StartError::WrongState(_)) => {
                        self.reject(None, RejectReason::GameAlreadyStarted);
                    }
                    Err(err) => self.reject(
                        None,
                        RejectReason::CannotStart {
                            reason: err.to_string(),
                        },
                    ),
                }
            }
            AdminCommand::ForceEndPhase => self.force_end_of_phase(),
            AdminCommand::EndGame => {
                if self.state == GameState::Running {
                    self.game_over(Victory {
                        kind: VictoryKind::Operator,
                        winners: Vec::new(),
                        reason: "ended by operator".to_string(),
                    })?;
                }
            }
            AdminCommand::SetPhaseMode { mode } => self.set_phase_mode(mode),
            AdminCommand::SetFogOfWar { enabled } => self.set_fog_of_war(enabled),
            AdminCommand::SetTimeout { secs } => self.set_timeout(secs),
            AdminCommand::CreatePlayer { name, ai, team } => {
                if let Err(err) = self.create_player(name, ai, team) {
                    warn!(%err, "cannot create player");
                }
            }
        }
        Ok(())
    }

    fn apply_orders(&mut self, player: PlayerId, orders: Vec<Order>) -> Result<(), FatalError> {
        let (unit_orders, player_orders): (Vec<Order>, Vec<Order>) =
            orders.into_iter().partition(Order::is_unit_order);
        if !unit_orders.is_empty() {
            absorb(
                "queue_orders",
                Some(player),
                self.hooks.queue_orders(player, &unit_orders),
            )?;
        }

        let Some(p) = self.players.get_mut(player) else {
            return Ok(());
        };
        for order in player_orders {
            match order {
                Order::SetResearch { tech } => p.researching = Some(tech),
                Order::SetResearchGoal { tech } => p.research_goal = tech,
                Order::SetMultiplier { index, target } if index < MAX_MULTIPLIERS => {
                    if p.multipliers.len() <= index {
                        p.multipliers
                            .resize(index + 1, Multiplier { value: 0, target: 0 });
                    }
                    p.multipliers[index].target = target;
                }
                Order::SetMultiplier { index, .. } => {
                    warn!(%player, index, "no such policy multiplier");
                }
                Order::MoveUnit { .. } | Order::Fortify { .. } | Order::Disband { .. } => {}
            }
        }
        Ok(())
    }

    fn flush_queued_input(&mut self, active: &[PlayerId]) -> Result<(), FatalError> {
        for &id in active {
            let orders = self.dispatcher.take_queued(id);
            if !orders.is_empty() {
                debug!(player = %id, count = orders.len(), "applying queued orders");
                self.apply_orders(id, orders)?;
            }
            if self.dispatcher.take_ready(id) {
                if let Some(p) = self.players.get_mut(id).filter(|p| p.is_alive()) {
                    p.phase_done = true;
                }
            }
        }
        Ok(())
    }

    fn check_startable(&self, force: bool) -> Result<(), StartError> {
        if self.state != GameState::Initial {
            return Err(StartError::WrongState(self.state));
        }
        self.config.validate()?;
        if self.phase_mode == PhaseMode::TeamsAlternate && self.players.teams().is_empty() {
            return Err(ConfigError::NoTeams.into());
        }
        if !force {
            let min = usize::from(self.config.min_players).max(1);
            let have = self.players.player_count();
            if have < min {
                return Err(StartError::NotEnoughPlayers { min, have });
            }
            if !self.players.all_ready() {
                return Err(StartError::NotReady);
            }
        }
        Ok(())
    }

    fn enter_running(&mut self, turn: u32) {
        self.diplomacy.sync_players(&self.players);
        self.turn = turn;
        self.phase = 0;
        self.hooks.set_fog_of_war(self.config.fog_of_war);
        info!(
            turn,
            players = self.players.slot_count(),
            mode = %self.phase_mode,
            "game started"
        );
        self.set_state(GameState::Running);
    }

    fn try_auto_start(&mut self) {
        if self.state != GameState::Initial
            || self.players.connected_count() == 0
            || !self.players.all_ready()
        {
            return;
        }
        match self.start_game(false) {
            Ok(()) | Err(StartError::NotEnoughPlayers { .. }) => {}
            Err(err) => warn!(%err, "cannot start game"),
        }
    }

    fn game_over(&mut self, victory: Victory) -> Result<(), FatalError> {
        for &id in &victory.winners {
            if let Some(p) = self.players.get_mut(id) {
                p.is_winner = true;
            }
        }
        info!(
            kind = %victory.kind,
            reason = %victory.reason,
            winners = ?victory.winners,
            "game over"
        );
        self.set_state(GameState::Over);
        self.notify(Notification::GameOver {
            kind: victory.kind,
            reason: victory.reason.clone(),
            winners: victory.winners.clone(),
        });
        self.victory = Some(victory);
        absorb("save_game", None, self.hooks.save_game("game over", true))?;
        Ok(())
    }

    fn evaluate_victory(&self) -> Option<Victory> {
        let spaceship_arrivals = if self.config.victory.spaceship {
            self.players
                .iter()
                .filter(|p| p.is_candidate())
                .filter_map(|p| self.hooks.spaceship_arrival(p.id).map(|year| (p.id, year)))
                .collect()
        } else {
            Vec::new()
        };
        let scenario_victors = if self.config.victory.scenario {
            self.hooks.scenario_victors()
        } else {
            None
        };
        check_victory(&VictoryInputs {
            players: &self.players,
            diplomacy: &self.diplomacy,
            config: &self.config.victory,
            turn: self.turn,
            end_turn: self.config.end_turn,
            year: self.current_year(),
            scenario_victors,
            spaceship_arrivals,
        })
    }

    fn refresh_standing(&mut self) {
        for id in self.players.alive_ids() {
            let score = self.hooks.score(id);
            let culture = self.hooks.culture(id);
            if let Some(p) = self.players.get_mut(id) {
                p.score = score;
                p.culture = culture;
            }
        }
    }

    fn retire_barbarians(&mut self) -> Result<(), FatalError> {
        let pct = u32::from(self.config.barbarian_retire_pct);
        if pct == 0 {
            return Ok(());
        }
        let barbarians: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.is_barbarian && p.is_alive())
            .map(|p| p.id)
            .collect();
        for id in barbarians {
            for unit in self.hooks.barbarian_units(id) {
                if self.rng.gen_range(0..100) < pct {
                    debug!(player = %id, unit = unit.0, "barbarian unit retires");
                    absorb("disband_unit", Some(id), self.hooks.disband_unit(unit))?;
                }
            }
        }
        Ok(())
    }

    fn stopped_outcome(&self) -> TurnOutcome {
        match (&self.state, &self.victory) {
            (GameState::Over, Some(victory)) => TurnOutcome::GameOver(victory.clone()),
            _ => TurnOutcome::NotRunning,
        }
    }

    fn driver<'a>(&'a mut self, notes: &'a mut Vec<Notification>) -> PhaseDriver<'a, H> {
        PhaseDriver {
            players: &mut self.players,
            diplomacy: &mut self.diplomacy,
            hooks: &mut self.hooks,
            config: &self.config,
            turn: self.turn,
            notes,
        }
    }

    fn set_state(&mut self, to: GameState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(%from, %to, "game state changed");
        self.notify(Notification::StateChanged { from, to });
    }

    fn reject(&mut self, player: Option<PlayerId>, reason: RejectReason) {
        warn!(?player, ?reason, "input rejected");
        self.notify(Notification::InputRejected { player, reason });
    }

    fn notify_all(&mut self, notes: Vec<Notification>) {
        for note in notes {
            self.notify(note);
        }
    }

    fn notify(&mut self, note: Notification) {
        let note = match &self.subscriber {
            Some(tx) => match tx.send(note) {
                Ok(()) => return,
                Err(mpsc::error::SendError(note)) => note,
            },
            None => note,
        };
        self.subscriber = None;
        self.outbox.push(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessWorld;

    fn controller(config: GameConfig) -> TurnController<HeadlessWorld> {
        TurnController::new(config, HeadlessWorld::new())
    }

    #[test]
    fn start_requires_ready_players() {
        let mut game = controller(GameConfig {
            min_players: 2,
            ..GameConfig::default()
        });
        let alice = game.create_player("Alice", false, None).unwrap();
        assert_eq!(
            game.start_game(false),
            Err(StartError::NotEnoughPlayers { min: 2, have: 1 })
        );

        game.create_player("Bot", true, None).unwrap();
        assert_eq!(game.start_game(false), Err(StartError::NotReady));

        game.players_mut().set_ready(alice, true).unwrap();
        assert_eq!(game.start_game(false), Ok(()));
        assert_eq!(game.current_state(), GameState::Running);
        assert_eq!(game.current_turn(), 1);
        assert_eq!(
            game.start_game(true),
            Err(StartError::WrongState(GameState::Running))
        );
    }

    #[test]
    fn config_errors_refuse_running() {
        let mut config = GameConfig::default();
        config.turn_timer.fixed_length = true;
        let mut game = controller(config);
        game.create_player("Bot", true, None).unwrap();

        assert_eq!(
            game.start_game(true),
            Err(StartError::Config(ConfigError::FixedLengthWithoutTimeout))
        );
        assert_eq!(game.current_state(), GameState::Initial);
    }

    #[test]
    fn lobby_auto_starts_when_everyone_is_ready() {
        let mut game = controller(GameConfig::default());
        let alice = game.create_player("Alice", false, None).unwrap();
        game.create_player("Bot", true, None).unwrap();
        let handle = game.input_handle();

        handle.connect(alice);
        game.process_pending_input().unwrap();
        assert_eq!(game.current_state(), GameState::Initial);

        handle.player_ready(alice);
        game.process_pending_input().unwrap();
        assert_eq!(game.current_state(), GameState::Running);
    }

    #[test]
    fn runtime_settings_are_staged() {
        let mut game = controller(GameConfig::default());
        game.create_player("Bot", true, None).unwrap();
        game.start_game(true).unwrap();

        game.set_phase_mode(PhaseMode::PlayersAlternate);
        game.set_fog_of_war(false);
        assert_eq!(game.phase_mode(), PhaseMode::Concurrent);
        assert!(game.hooks().fog_of_war());
    }

    #[test]
    fn rejected_input_is_reported() {
        let mut game = controller(GameConfig::default());
        let handle = game.input_handle();
        handle.surrender(PlayerId(3));
        game.process_pending_input().unwrap();

        assert_eq!(
            game.drain_notifications(),
            vec![Notification::InputRejected {
                player: Some(PlayerId(3)),
                reason: RejectReason::UnknownPlayer,
            }]
        );
    }

    #[test]
    fn operator_start_is_refused_once_running() {
        let mut game = controller(GameConfig::default());
        game.create_player("Bot", true, None).unwrap();
        let handle = game.input_handle();

        handle.admin(AdminCommand::StartGame { force: false });
        game.process_pending_input().unwrap();
        assert_eq!(game.current_state(), GameState::Running);
        game.drain_notifications();

        handle.admin(AdminCommand::StartGame { force: true });
        game.process_pending_input().unwrap();
        assert_eq!(
            game.drain_notifications(),
            vec![Notification::InputRejected {
                player: None,
                reason: RejectReason::GameAlreadyStarted,
            }]
        );
        assert_eq!(game.current_turn(), 1);
    }

    #[test]
    fn restart_applies_settings_staged_during_the_game() {
        let mut game = controller(GameConfig::default());
        game.create_player("Bot", true, None).unwrap();
        game.start_game(true).unwrap();
        game.set_phase_mode(PhaseMode::PlayersAlternate);
        game.set_fog_of_war(false);

        game.input_handle().admin(AdminCommand::EndGame);
        game.process_pending_input().unwrap();
        assert_eq!(game.current_state(), GameState::Over);
        assert_eq!(game.phase_mode(), PhaseMode::Concurrent);

        game.soft_restart();
        assert_eq!(game.current_state(), GameState::Initial);
        assert_eq!(game.phase_mode(), PhaseMode::PlayersAlternate);
        assert_eq!(game.config().phase_mode, PhaseMode::PlayersAlternate);
        assert!(!game.config().fog_of_war);
        assert!(game.staged_phase_mode.is_none() && game.staged_fog.is_none());
    }

    #[test]
    fn subscribers_receive_notifications() {
        let mut game = controller(GameConfig::default());
        let mut rx = game.subscribe();
        game.create_player("Bot", true, None).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::PlayerCreated { player: PlayerId(0) }
        );
        assert!(game.drain_notifications().is_empty());
    }
}
