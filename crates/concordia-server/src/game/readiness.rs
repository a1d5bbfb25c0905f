//! Phase-done predicate.

use concordia_protocol::PlayerId;

use crate::players::PlayerRegistry;

/// Everything the predicate looks at.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessInput<'a> {
    pub players: &'a PlayerRegistry,
    /// Players acting in the current phase
    pub active: &'a [PlayerId],
    pub turn_blocking: bool,
    /// Timer alone ends the phase
    pub fixed_length: bool,
    /// The phase deadline has passed
    pub timed_out: bool,
}

/// Whether the server may stop waiting and end the current phase.
pub fn phase_done(input: &ReadinessInput<'_>) -> bool {
    if input.timed_out {
        return true;
    }
    if input.fixed_length {
        return false;
    }
    // Nobody is around to press "done"; never hang an all-AI game.
    if input.players.connected_count() == 0 {
        return true;
    }

    input.active.iter().all(|&id| {
        let Some(player) = input.players.get(id) else {
            return true;
        };
        if !player.is_alive() && !player.has_assets() {
            return true;
        }
        let done = if player.is_ai {
            player.ai_phase_done
        } else {
            player.phase_done
        };
        if player.is_connected {
            return done;
        }
        if input.turn_blocking && player.is_human() {
            return done;
        }
        !player.is_ai || player.ai_phase_done
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::PlayerStatus;

    fn input<'a>(players: &'a PlayerRegistry, active: &'a [PlayerId]) -> ReadinessInput<'a> {
        ReadinessInput {
            players,
            active,
            turn_blocking: false,
            fixed_length: false,
            timed_out: false,
        }
    }

    fn registry(humans: u8, ais: u8) -> (PlayerRegistry, Vec<PlayerId>) {
        let mut reg = PlayerRegistry::new(16);
        for i in 0..humans {
            reg.add_player(format!("human{i}"), false, None).unwrap();
        }
        for i in 0..ais {
            reg.add_player(format!("ai{i}"), true, None).unwrap();
        }
        let ids = reg.ids();
        (reg, ids)
    }

    #[test]
    fn all_ai_game_never_deadlocks() {
        let (reg, ids) = registry(0, 3);
        // ai_phase_done never set
        assert!(phase_done(&input(&reg, &ids)));
    }

    #[test]
    fn connected_player_blocks_until_done() {
        let (mut reg, ids) = registry(1, 1);
        reg.connect(ids[0]).unwrap();
        reg.get_mut(ids[1]).unwrap().ai_phase_done = true;
        assert!(!phase_done(&input(&reg, &ids)));

        reg.get_mut(ids[0]).unwrap().phase_done = true;
        assert!(phase_done(&input(&reg, &ids)));
    }

    #[test]
    fn unfinished_ai_blocks_while_humans_play() {
        let (mut reg, ids) = registry(1, 1);
        reg.connect(ids[0]).unwrap();
        reg.get_mut(ids[0]).unwrap().phase_done = true;
        assert!(!phase_done(&input(&reg, &ids)));
    }

    #[test]
    fn turn_blocking_waits_for_disconnected_humans() {
        let (mut reg, ids) = registry(2, 0);
        reg.connect(ids[0]).unwrap();
        reg.get_mut(ids[0]).unwrap().phase_done = true;
        assert!(phase_done(&input(&reg, &ids)));

        let mut blocking = input(&reg, &ids);
        blocking.turn_blocking = true;
        assert!(!phase_done(&blocking));
    }

    #[test]
    fn timeout_and_fixed_length() {
        let (mut reg, ids) = registry(1, 0);
        reg.connect(ids[0]).unwrap();

        let mut timed_out = input(&reg, &ids);
        timed_out.timed_out = true;
        assert!(phase_done(&timed_out));

        reg.get_mut(ids[0]).unwrap().phase_done = true;
        let mut fixed = input(&reg, &ids);
        fixed.fixed_length = true;
        assert!(!phase_done(&fixed));
    }

    #[test]
    fn dead_players_without_assets_are_ignored() {
        let (mut reg, ids) = registry(1, 1);
        reg.connect(ids[0]).unwrap();
        reg.get_mut(ids[0]).unwrap().phase_done = true;
        reg.get_mut(ids[1]).unwrap().status = PlayerStatus::Dead;
        assert!(phase_done(&input(&reg, &ids)));
    }
}
