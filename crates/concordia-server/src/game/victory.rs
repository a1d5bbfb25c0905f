//! Victory evaluation.
//!
//! A pure, ordered check. The first condition that holds ends the game and
//! the remaining ones are never looked at.

use std::collections::BTreeSet;

use concordia_protocol::{PlayerId, Victory, VictoryConfig, VictoryKind};

use crate::game::DiplomacyTable;
use crate::players::{Player, PlayerRegistry};

/// Snapshot of everything the evaluator reads.
#[derive(Clone, Debug)]
pub struct VictoryInputs<'a> {
    pub players: &'a PlayerRegistry,
    pub diplomacy: &'a DiplomacyTable,
    pub config: &'a VictoryConfig,
    /// The turn that just finished
    pub turn: u32,
    pub end_turn: u32,
    pub year: i32,
    pub scenario_victors: Option<Vec<PlayerId>>,
    /// Launched spaceships and their arrival year
    pub spaceship_arrivals: Vec<(PlayerId, i32)>,
}

pub fn check_victory(input: &VictoryInputs<'_>) -> Option<Victory> {
    let config = input.config;
    let candidates: Vec<&Player> = input.players.iter().filter(|p| p.is_candidate()).collect();
    let defeated = input
        .players
        .iter()
        .filter(|p| !p.is_barbarian && !p.is_candidate())
        .count();

    if config.scenario {
        if let Some(winners) = &input.scenario_victors {
            return Some(victory(VictoryKind::Scenario, winners.clone(), "scenario victory"));
        }
    }

    if candidates.is_empty() && defeated > 0 {
        return Some(victory(VictoryKind::Draw, Vec::new(), "everybody lost"));
    }

    if config.conquest && candidates.len() == 1 && defeated > 0 {
        let winner = candidates[0];
        return Some(victory(
            VictoryKind::Conquest,
            vec![winner.id],
            format!("{} conquered the world", winner.name),
        ));
    }

    let teams: BTreeSet<_> = candidates.iter().map(|p| p.team).collect();

    if config.allied && candidates.len() > 1 && teams.len() > 1 && defeated > 0 {
        let all_allied = candidates.iter().enumerate().all(|(i, a)| {
            candidates[i + 1..]
                .iter()
                .all(|b| input.diplomacy.is_allied(a.id, b.id))
        });
        if all_allied {
            return Some(victory(
                VictoryKind::Allied,
                ids(&candidates),
                "allied victory",
            ));
        }
    }

    if config.team && teams.len() == 1 && defeated > 0 {
        if let Some(team) = teams.first() {
            return Some(victory(
                VictoryKind::Team,
                ids(&candidates),
                format!("team {team} is victorious"),
            ));
        }
    }

    if config.culture {
        if let Some(win) = culture_victory(config, &candidates) {
            return Some(win);
        }
    }

    if config.spaceship {
        let arrived = input
            .spaceship_arrivals
            .iter()
            .filter(|(id, year)| {
                *year <= input.year && candidates.iter().any(|p| p.id == *id)
            })
            .min_by_key(|(id, year)| (*year, *id));
        if let Some(&(winner, year)) = arrived {
            return Some(victory(
                VictoryKind::Spaceship,
                vec![winner],
                format!("spaceship of {winner} arrived in {year}"),
            ));
        }
    }

    if config.turn_limit && input.turn >= input.end_turn {
        let best = candidates.iter().map(|p| p.score).max();
        let winners = candidates
            .iter()
            .filter(|p| Some(p.score) == best)
            .map(|p| p.id)
            .collect();
        return Some(victory(
            VictoryKind::TurnLimit,
            winners,
            format!("game ended after turn {}", input.turn),
        ));
    }

    None
}

fn culture_victory(config: &VictoryConfig, candidates: &[&Player]) -> Option<Victory> {
    let mut ranked: Vec<&Player> = candidates.to_vec();
    ranked.sort_by(|a, b| b.culture.cmp(&a.culture).then(a.id.cmp(&b.id)));
    let best = ranked.first()?;
    let second = ranked.get(1).map_or(0, |p| p.culture);

    let lead_needed = i64::from(second) * i64::from(100 + config.culture_lead_pct) / 100;
    if best.culture >= config.culture_points && i64::from(best.culture) > lead_needed {
        return Some(victory(
            VictoryKind::Culture,
            vec![best.id],
            format!("{} dominates culturally", best.name),
        ));
    }
    None
}

fn ids(players: &[&Player]) -> Vec<PlayerId> {
    players.iter().map(|p| p.id).collect()
}

fn victory(kind: VictoryKind, winners: Vec<PlayerId>, reason: impl Into<String>) -> Victory {
    Victory {
        kind,
        winners,
        reason: reason.into(),
    }
}
