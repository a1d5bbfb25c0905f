//! Inbound event boundary.
//!
//! Transport code never touches game state. It holds an [`InputHandle`] and
//! pushes [`Inbound`] events onto a channel drained by the task that owns the
//! [`TurnController`](crate::TurnController). The dispatcher decides, per
//! event, whether it is applied now, held back until the sender's phase, or
//! refused.

use std::collections::{BTreeMap, BTreeSet};

use concordia_protocol::{
    AdminCommand, GameState, Inbound, Order, PlayerId, RejectReason, TreatyAction,
};
use tokio::sync::mpsc;

use crate::players::PlayerRegistry;

/// Cloneable sender handed to the session layer.
#[derive(Clone, Debug)]
pub struct InputHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl InputHandle {
    /// Returns false once the controller is gone.
    pub fn send(&self, event: Inbound) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn connect(&self, player: PlayerId) -> bool {
        self.send(Inbound::Connect { player })
    }

    pub fn disconnect(&self, player: PlayerId) -> bool {
        self.send(Inbound::Disconnect { player })
    }

    pub fn player_ready(&self, player: PlayerId) -> bool {
        self.send(Inbound::PlayerReady { player })
    }

    pub fn submit_orders(&self, player: PlayerId, orders: Vec<Order>) -> bool {
        self.send(Inbound::Orders { player, orders })
    }

    pub fn treaty_action(&self, player: PlayerId, other: PlayerId, action: TreatyAction) -> bool {
        self.send(Inbound::Treaty {
            player,
            other,
            action,
        })
    }

    pub fn surrender(&self, player: PlayerId) -> bool {
        self.send(Inbound::Surrender { player })
    }

    pub fn force_end_of_phase(&self) -> bool {
        self.admin(AdminCommand::ForceEndPhase)
    }

    pub fn admin(&self, command: AdminCommand) -> bool {
        self.send(Inbound::Admin { command })
    }
}

/// What to do with an inbound event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    Apply,
    /// Orders or readiness from a player whose phase has not come yet
    Queue,
    Reject(RejectReason),
}

/// Receiving end plus input held back for inactive players.
#[derive(Debug)]
pub struct InputDispatcher {
    rx: mpsc::UnboundedReceiver<Inbound>,
    handle: InputHandle,
    queued: BTreeMap<PlayerId, Vec<Order>>,
    queued_ready: BTreeSet<PlayerId>,
}

impl InputDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: InputHandle { tx },
            queued: BTreeMap::new(),
            queued_ready: BTreeSet::new(),
        }
    }

    pub fn handle(&self) -> InputHandle {
        self.handle.clone()
    }

    /// Next pending event without waiting.
    pub fn try_next(&mut self) -> Option<Inbound> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event. Cancel safe.
    ///
    /// The dispatcher holds a sender of its own, so the channel outlives every
    /// handed-out [`InputHandle`] and this never yields `None`.
    pub async fn next(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }

    pub fn queue(&mut self, player: PlayerId, orders: Vec<Order>) {
        self.queued.entry(player).or_default().extend(orders);
    }

    pub fn take_queued(&mut self, player: PlayerId) -> Vec<Order> {
        self.queued.remove(&player).unwrap_or_default()
    }

    pub fn queued_count(&self, player: PlayerId) -> usize {
        self.queued.get(&player).map_or(0, Vec::len)
    }

    /// Hold a "done" signal until `player`'s phase begins.
    pub fn queue_ready(&mut self, player: PlayerId) {
        self.queued_ready.insert(player);
    }

    pub fn take_ready(&mut self, player: PlayerId) -> bool {
        self.queued_ready.remove(&player)
    }

    pub fn clear_queued(&mut self) {
        self.queued.clear();
        self.queued_ready.clear();
    }

    /// Decide what happens to `event` given the current game state.
    pub fn classify(
        event: &Inbound,
        state: GameState,
        players: &PlayerRegistry,
        active: &[PlayerId],
    ) -> Disposition {
        let Some(id) = event.player() else {
            return Disposition::Apply;
        };
        let Some(player) = players.get(id) else {
            return Disposition::Reject(RejectReason::UnknownPlayer);
        };

        match event {
            Inbound::Connect { .. } if player.is_connected => {
                Disposition::Reject(RejectReason::AlreadyConnected)
            }
            Inbound::Disconnect { .. } if !player.is_connected => {
                Disposition::Reject(RejectReason::NotConnected)
            }
            Inbound::Connect { .. } | Inbound::Disconnect { .. } => Disposition::Apply,
            Inbound::PlayerReady { .. } => match state {
                GameState::Initial => Disposition::Apply,
                GameState::Running if !player.is_alive() => {
                    Disposition::Reject(RejectReason::PlayerDead)
                }
                GameState::Running if !active.contains(&id) => Disposition::Queue,
                GameState::Running => Disposition::Apply,
                GameState::Over => Disposition::Reject(RejectReason::GameNotRunning),
            },
            _ if state != GameState::Running => Disposition::Reject(RejectReason::GameNotRunning),
            _ if !player.is_alive() => Disposition::Reject(RejectReason::PlayerDead),
            Inbound::Orders { .. } if !active.contains(&id) => Disposition::Queue,
            _ => Disposition::Apply,
        }
    }
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use concordia_protocol::{TechId, UnitId};

    use super::*;
    use crate::players::PlayerStatus;

    fn registry() -> PlayerRegistry {
        let mut reg = PlayerRegistry::new(4);
        reg.add_player("Alice", false, None).unwrap();
        reg.add_player("Bob", false, None).unwrap();
        reg
    }

    #[test]
    fn unknown_and_dead_players_are_rejected() {
        let mut reg = registry();
        let orders = Inbound::Orders {
            player: PlayerId(7),
            orders: vec![],
        };
        assert_eq!(
            InputDispatcher::classify(&orders, GameState::Running, &reg, &[]),
            Disposition::Reject(RejectReason::UnknownPlayer)
        );

        reg.get_mut(PlayerId(1)).unwrap().status = PlayerStatus::Dead;
        let surrender = Inbound::Surrender { player: PlayerId(1) };
        assert_eq!(
            InputDispatcher::classify(&surrender, GameState::Running, &reg, &[]),
            Disposition::Reject(RejectReason::PlayerDead)
        );
    }

    #[test]
    fn game_actions_need_a_running_game() {
        let reg = registry();
        let treaty = Inbound::Treaty {
            player: PlayerId(0),
            other: PlayerId(1),
            action: TreatyAction::SignPeace,
        };
        assert_eq!(
            InputDispatcher::classify(&treaty, GameState::Initial, &reg, &[]),
            Disposition::Reject(RejectReason::GameNotRunning)
        );
        let ready = Inbound::PlayerReady { player: PlayerId(0) };
        assert_eq!(
            InputDispatcher::classify(&ready, GameState::Initial, &reg, &[]),
            Disposition::Apply
        );
        let admin = Inbound::Admin {
            command: AdminCommand::EndGame,
        };
        assert_eq!(
            InputDispatcher::classify(&admin, GameState::Over, &reg, &[]),
            Disposition::Apply
        );
    }

    #[test]
    fn orders_outside_own_phase_are_queued() {
        let reg = registry();
        let orders = Inbound::Orders {
            player: PlayerId(1),
            orders: vec![Order::Fortify { unit: UnitId(3) }],
        };
        assert_eq!(
            InputDispatcher::classify(&orders, GameState::Running, &reg, &[PlayerId(0)]),
            Disposition::Queue
        );
        assert_eq!(
            InputDispatcher::classify(&orders, GameState::Running, &reg, &[PlayerId(1)]),
            Disposition::Apply
        );
    }

    #[test]
    fn early_ready_waits_for_the_players_phase() {
        let reg = registry();
        let ready = Inbound::PlayerReady { player: PlayerId(1) };
        assert_eq!(
            InputDispatcher::classify(&ready, GameState::Running, &reg, &[PlayerId(0)]),
            Disposition::Queue
        );
        assert_eq!(
            InputDispatcher::classify(&ready, GameState::Running, &reg, &[PlayerId(1)]),
            Disposition::Apply
        );

        let mut dispatcher = InputDispatcher::new();
        dispatcher.queue_ready(PlayerId(1));
        dispatcher.queue_ready(PlayerId(2));
        assert!(dispatcher.take_ready(PlayerId(1)));
        assert!(!dispatcher.take_ready(PlayerId(1)));
        dispatcher.clear_queued();
        assert!(!dispatcher.take_ready(PlayerId(2)));
    }

    #[test]
    fn connection_state_is_checked() {
        let mut reg = registry();
        let connect = Inbound::Connect { player: PlayerId(0) };
        let disconnect = Inbound::Disconnect { player: PlayerId(0) };
        assert_eq!(
            InputDispatcher::classify(&disconnect, GameState::Running, &reg, &[]),
            Disposition::Reject(RejectReason::NotConnected)
        );
        reg.connect(PlayerId(0)).unwrap();
        assert_eq!(
            InputDispatcher::classify(&connect, GameState::Over, &reg, &[]),
            Disposition::Reject(RejectReason::AlreadyConnected)
        );
        assert_eq!(
            InputDispatcher::classify(&disconnect, GameState::Over, &reg, &[]),
            Disposition::Apply
        );
    }

    #[tokio::test]
    async fn handle_feeds_the_dispatcher() {
        let mut dispatcher = InputDispatcher::new();
        let handle = dispatcher.handle();
        assert!(handle.player_ready(PlayerId(0)));
        assert!(handle.submit_orders(PlayerId(1), vec![Order::SetResearch { tech: TechId(4) }]));

        assert!(matches!(
            dispatcher.next().await,
            Some(Inbound::PlayerReady { player: PlayerId(0) })
        ));
        assert!(matches!(dispatcher.try_next(), Some(Inbound::Orders { .. })));
        assert!(dispatcher.try_next().is_none());
    }

    #[test]
    fn waiting_for_input_wakes_on_send() {
        let mut dispatcher = InputDispatcher::new();
        let handle = dispatcher.handle();
        let mut next = tokio_test::task::spawn(dispatcher.next());
        tokio_test::assert_pending!(next.poll());

        handle.connect(PlayerId(2));
        assert!(next.is_woken());
        let event = tokio_test::assert_ready!(next.poll());
        assert!(matches!(event, Some(Inbound::Connect { player: PlayerId(2) })));
    }

    #[test]
    fn queued_orders_accumulate_per_player() {
        let mut dispatcher = InputDispatcher::new();
        dispatcher.queue(PlayerId(1), vec![Order::Fortify { unit: UnitId(1) }]);
        dispatcher.queue(PlayerId(1), vec![Order::Disband { unit: UnitId(2) }]);
        assert_eq!(dispatcher.queued_count(PlayerId(1)), 2);
        assert_eq!(dispatcher.take_queued(PlayerId(1)).len(), 2);
        assert!(dispatcher.take_queued(PlayerId(1)).is_empty());
    }
}
