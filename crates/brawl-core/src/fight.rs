//! Fight records and the combat rules the server enforces itself.
//!
//! Damage magnitudes arrive declared by the client; the one rule applied
//! authoritatively here is block mitigation, so a client cannot dodge it
//! by omitting its local block state. Everything else about damage
//! ranges belongs to the client-facing game logic.

use std::time::SystemTime;

use thiserror::Error;

use crate::events::ActionKind;
use crate::transport::ConnectionId;

/// Starting health for both fighters.
pub const MAX_HEALTH: u32 = 100;

/// Multiplier applied to incoming damage while the defender is blocking.
pub const BLOCK_MITIGATION: f64 = 0.3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("Invalid fight or fighter ID")]
    MissingId,

    #[error("Fight is full or already started")]
    FightUnavailable,
}

/// One seat in a fight. The host created it; the challenger filled the
/// second slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Host,
    Challenger,
}

impl Seat {
    pub fn other(self) -> Seat {
        match self {
            Seat::Host => Seat::Challenger,
            Seat::Challenger => Seat::Host,
        }
    }
}

/// Fight status. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FightStatus {
    Waiting,
    Active,
    Finished,
}

/// One side of a fight.
///
/// `connection` is current routing information, nothing more; a rejoin
/// replaces it without touching identity or progress.
#[derive(Debug, Clone)]
pub struct Fighter {
    pub id: String,
    pub name: String,
    pub character: String,
    pub connection: ConnectionId,
    pub health: u32,
    pub blocking: bool,
}

impl Fighter {
    pub fn new(id: String, name: String, character: String, connection: ConnectionId) -> Self {
        Self {
            id,
            name,
            character,
            connection,
            health: MAX_HEALTH,
            blocking: false,
        }
    }
}

/// How a join against an existing fight was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Challenger seat filled; the fight just became active
    Started,

    /// Known fighter reconnected; only the connection handle changed
    Rebound(Seat),
}

/// What a resolved combat action amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stale or unrecognized input, dropped without effect
    Ignored,

    /// Block stance updated, nothing to announce
    StanceChanged,

    /// Damage landed, both fighters still standing
    Hit {
        attacker: Seat,
        damage: u32,
        defender_health: u32,
    },

    /// Damage landed and the defender is down
    Knockout {
        winner: Seat,
        damage: u32,
        winner_health: u32,
    },
}

/// A single two-fighter contest.
///
/// The host seat is populated for the record's whole lifetime; the fight
/// is waiting exactly as long as the challenger seat is empty.
pub struct Fight {
    pub id: String,
    pub host: Fighter,
    pub challenger: Option<Fighter>,
    pub status: FightStatus,
    /// Registry-issued stamp distinguishing successive records created
    /// under the same id. Deferred removals capture it at schedule time
    /// and refuse to touch a record that carries a newer one.
    pub epoch: u64,
    /// Diagnostics only.
    pub created_at: SystemTime,
}

impl Fight {
    pub fn new(id: String, epoch: u64, host: Fighter) -> Self {
        Self {
            id,
            host,
            challenger: None,
            status: FightStatus::Waiting,
            epoch,
            created_at: SystemTime::now(),
        }
    }

    /// Which seat `fighter_id` occupies, if any.
    pub fn seat_of(&self, fighter_id: &str) -> Option<Seat> {
        if self.host.id == fighter_id {
            Some(Seat::Host)
        } else if self
            .challenger
            .as_ref()
            .map_or(false, |c| c.id == fighter_id)
        {
            Some(Seat::Challenger)
        } else {
            None
        }
    }

    pub fn fighter(&self, seat: Seat) -> Option<&Fighter> {
        match seat {
            Seat::Host => Some(&self.host),
            Seat::Challenger => self.challenger.as_ref(),
        }
    }

    pub fn fighter_mut(&mut self, seat: Seat) -> Option<&mut Fighter> {
        match seat {
            Seat::Host => Some(&mut self.host),
            Seat::Challenger => self.challenger.as_mut(),
        }
    }

    /// Admit a fighter into an existing fight.
    ///
    /// Decision table over `(status, which seat the identity matches)`,
    /// in precedence order: fill the challenger seat, rebind a known
    /// fighter's connection, otherwise reject.
    pub fn admit(
        &mut self,
        fighter_id: &str,
        name: Option<String>,
        character: String,
        connection: ConnectionId,
    ) -> Result<Admission, JoinError> {
        match (self.status, self.seat_of(fighter_id)) {
            // Second distinct fighter while waiting: fill the seat and start
            (FightStatus::Waiting, None) => {
                self.challenger = Some(Fighter::new(
                    fighter_id.to_string(),
                    name.unwrap_or_else(|| "Fighter 2".to_string()),
                    character,
                    connection,
                ));
                self.status = FightStatus::Active;
                Ok(Admission::Started)
            }

            // Known fighter on either seat: reconnect, keep all progress
            (_, Some(seat)) => {
                if let Some(fighter) = self.fighter_mut(seat) {
                    fighter.connection = connection;
                }
                Ok(Admission::Rebound(seat))
            }

            // Third identity against a full or finished fight
            (_, None) => Err(JoinError::FightUnavailable),
        }
    }

    /// Apply a combat action from `fighter_id`.
    ///
    /// Anything that does not line up with an active fight and a known
    /// seat is ignored rather than rejected; the transport is
    /// fire-and-forget and stale inputs are expected around reconnects.
    pub fn resolve(
        &mut self,
        fighter_id: &str,
        action: ActionKind,
        damage: u32,
        blocking: bool,
    ) -> Outcome {
        if self.status != FightStatus::Active {
            return Outcome::Ignored;
        }
        let Some(seat) = self.seat_of(fighter_id) else {
            return Outcome::Ignored;
        };

        match action {
            ActionKind::Block => {
                if let Some(fighter) = self.fighter_mut(seat) {
                    fighter.blocking = blocking;
                }
                Outcome::StanceChanged
            }

            ActionKind::Attack | ActionKind::Special => {
                let Some(defender) = self.fighter_mut(seat.other()) else {
                    return Outcome::Ignored;
                };

                let dealt = if defender.blocking {
                    (damage as f64 * BLOCK_MITIGATION).floor() as u32
                } else {
                    damage
                };
                defender.health = defender.health.saturating_sub(dealt);
                let defender_health = defender.health;

                if defender_health == 0 {
                    self.status = FightStatus::Finished;
                    let winner_health = self.fighter(seat).map_or(0, |f| f.health);
                    Outcome::Knockout {
                        winner: seat,
                        damage: dealt,
                        winner_health,
                    }
                } else {
                    Outcome::Hit {
                        attacker: seat,
                        damage: dealt,
                        defender_health,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn waiting_fight() -> Fight {
        let host = Fighter::new(
            "alice".to_string(),
            "Ann".to_string(),
            "ryu".to_string(),
            Uuid::new_v4(),
        );
        Fight::new("f1".to_string(), 0, host)
    }

    fn active_fight() -> Fight {
        let mut fight = waiting_fight();
        fight
            .admit("bob", Some("Bo".to_string()), "ken".to_string(), Uuid::new_v4())
            .unwrap();
        fight
    }

    #[test]
    fn challenger_fills_seat_and_activates() {
        let mut fight = waiting_fight();
        let admission = fight
            .admit("bob", Some("Bo".to_string()), "ken".to_string(), Uuid::new_v4())
            .unwrap();

        assert_eq!(admission, Admission::Started);
        assert_eq!(fight.status, FightStatus::Active);
        let challenger = fight.challenger.as_ref().unwrap();
        assert_eq!(challenger.name, "Bo");
        assert_eq!(challenger.health, MAX_HEALTH);
    }

    #[test]
    fn challenger_without_name_gets_default() {
        let mut fight = waiting_fight();
        fight
            .admit("bob", None, "ken".to_string(), Uuid::new_v4())
            .unwrap();

        assert_eq!(fight.challenger.as_ref().unwrap().name, "Fighter 2");
    }

    #[test]
    fn rejoin_rebinds_connection_only() {
        let mut fight = active_fight();
        fight.challenger.as_mut().unwrap().health = 40;
        let new_conn = Uuid::new_v4();

        let admission = fight
            .admit("bob", Some("Bo".to_string()), "ken".to_string(), new_conn)
            .unwrap();

        assert_eq!(admission, Admission::Rebound(Seat::Challenger));
        let challenger = fight.challenger.as_ref().unwrap();
        assert_eq!(challenger.connection, new_conn);
        assert_eq!(challenger.health, 40);
        assert_eq!(fight.status, FightStatus::Active);
    }

    #[test]
    fn host_can_rebind_while_waiting() {
        let mut fight = waiting_fight();
        let new_conn = Uuid::new_v4();

        let admission = fight
            .admit("alice", Some("Ann".to_string()), "ryu".to_string(), new_conn)
            .unwrap();

        assert_eq!(admission, Admission::Rebound(Seat::Host));
        assert_eq!(fight.host.connection, new_conn);
        assert_eq!(fight.status, FightStatus::Waiting);
        assert!(fight.challenger.is_none());
    }

    #[test]
    fn third_fighter_is_rejected() {
        let mut fight = active_fight();

        let err = fight
            .admit("carol", Some("Cy".to_string()), "chun".to_string(), Uuid::new_v4())
            .unwrap_err();

        assert_eq!(err, JoinError::FightUnavailable);
        assert_eq!(fight.host.id, "alice");
        assert_eq!(fight.challenger.as_ref().unwrap().id, "bob");
    }

    #[test]
    fn attack_deals_declared_damage() {
        let mut fight = active_fight();

        let outcome = fight.resolve("alice", ActionKind::Attack, 20, false);

        assert_eq!(
            outcome,
            Outcome::Hit {
                attacker: Seat::Host,
                damage: 20,
                defender_health: 80,
            }
        );
        assert_eq!(fight.challenger.as_ref().unwrap().health, 80);
    }

    #[test]
    fn block_mitigates_with_floor() {
        let mut fight = active_fight();
        fight.resolve("bob", ActionKind::Block, 0, true);

        let outcome = fight.resolve("alice", ActionKind::Attack, 25, false);

        // floor(25 * 0.3) = 7
        assert_eq!(
            outcome,
            Outcome::Hit {
                attacker: Seat::Host,
                damage: 7,
                defender_health: 93,
            }
        );
    }

    #[test]
    fn lowering_block_restores_full_damage() {
        let mut fight = active_fight();
        fight.resolve("bob", ActionKind::Block, 0, true);
        fight.resolve("bob", ActionKind::Block, 0, false);

        let outcome = fight.resolve("alice", ActionKind::Special, 20, false);

        assert_eq!(
            outcome,
            Outcome::Hit {
                attacker: Seat::Host,
                damage: 20,
                defender_health: 80,
            }
        );
    }

    #[test]
    fn health_clamps_at_zero() {
        let mut fight = active_fight();

        let outcome = fight.resolve("bob", ActionKind::Special, 250, false);

        assert_eq!(
            outcome,
            Outcome::Knockout {
                winner: Seat::Challenger,
                damage: 250,
                winner_health: 100,
            }
        );
        assert_eq!(fight.host.health, 0);
    }

    #[test]
    fn knockout_finishes_fight_exactly_once() {
        let mut fight = active_fight();
        fight.resolve("alice", ActionKind::Attack, 60, false);

        let outcome = fight.resolve("alice", ActionKind::Attack, 60, false);
        assert!(matches!(outcome, Outcome::Knockout { winner: Seat::Host, .. }));
        assert_eq!(fight.status, FightStatus::Finished);

        // Fight is over; further inputs fall on the floor
        let outcome = fight.resolve("bob", ActionKind::Attack, 60, false);
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(fight.host.health, 100);
    }

    #[test]
    fn actions_ignored_while_waiting() {
        let mut fight = waiting_fight();

        let outcome = fight.resolve("alice", ActionKind::Attack, 20, false);

        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(fight.host.health, MAX_HEALTH);
    }

    #[test]
    fn unknown_identity_is_ignored() {
        let mut fight = active_fight();

        let outcome = fight.resolve("carol", ActionKind::Attack, 20, false);

        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(fight.host.health, MAX_HEALTH);
        assert_eq!(fight.challenger.as_ref().unwrap().health, MAX_HEALTH);
    }
}
