//! Join coordination and action resolution.
//!
//! Handlers are synchronous: each finishes its read-check-mutate
//! sequence against a fight record before anything else can touch the
//! same id, and outbound events are sent only after the record guard is
//! dropped. Two events for the same fight can therefore never interleave
//! their state changes, while unrelated fights proceed in parallel.

use std::sync::Arc;

use tracing::{debug, info};

use crate::events::{ActionRequest, JoinRequest, ServerEvent};
use crate::fight::{Admission, Fight, Fighter, FightStatus, JoinError, Outcome, Seat};
use crate::reaper::{Reaper, ReaperConfig};
use crate::registry::FightRegistry;
use crate::transport::{ConnectionId, Transport};

/// The match orchestration engine: owns the registry and drives all
/// state changes in response to transport events.
pub struct Engine<T: Transport> {
    registry: FightRegistry,
    transport: Arc<T>,
    reaper: Reaper,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: Arc<T>, config: ReaperConfig) -> Self {
        let registry = FightRegistry::new();
        let reaper = Reaper::new(registry.clone(), config);
        Self {
            registry,
            transport,
            reaper,
        }
    }

    /// Number of live fights, for the health probe.
    pub fn fight_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &FightRegistry {
        &self.registry
    }

    /// Handle a join request: create, fill, rebind, or reject.
    pub fn handle_join(&self, req: JoinRequest) {
        if req.fight_id.is_empty() || req.fighter_id.is_empty() {
            self.transport.send(
                req.connection,
                ServerEvent::Error {
                    message: JoinError::MissingId.to_string(),
                },
            );
            return;
        }

        let host = Fighter::new(
            req.fighter_id.clone(),
            req.display_name
                .clone()
                .unwrap_or_else(|| "Fighter 1".to_string()),
            req.character.clone(),
            req.connection,
        );
        let (mut fight, created) = self.registry.get_or_create(&req.fight_id, host);

        if created {
            let host_name = fight.host.name.clone();
            drop(fight);
            info!(fight_id = %req.fight_id, fighter = %host_name, "fight created");
            self.transport
                .send(req.connection, ServerEvent::WaitingForOpponent);
            return;
        }

        match fight.admit(
            &req.fighter_id,
            req.display_name,
            req.character,
            req.connection,
        ) {
            Ok(Admission::Started) => {
                let deliveries: Vec<(ConnectionId, ServerEvent)> = [Seat::Host, Seat::Challenger]
                    .into_iter()
                    .filter_map(|seat| {
                        let conn = fight.fighter(seat)?.connection;
                        Some((conn, start_event(&fight, seat)?))
                    })
                    .collect();
                drop(fight);
                info!(fight_id = %req.fight_id, fighter = %req.fighter_id, "fight started");
                for (conn, event) in deliveries {
                    self.transport.send(conn, event);
                }
            }

            Ok(Admission::Rebound(seat)) => {
                let event = if fight.status == FightStatus::Waiting {
                    Some(ServerEvent::WaitingForOpponent)
                } else {
                    start_event(&fight, seat)
                };
                drop(fight);
                info!(fight_id = %req.fight_id, fighter = %req.fighter_id, "fighter reconnected");
                if let Some(event) = event {
                    self.transport.send(req.connection, event);
                }
            }

            Err(err) => {
                drop(fight);
                info!(fight_id = %req.fight_id, fighter = %req.fighter_id, "join rejected: {}", err);
                self.transport.send(
                    req.connection,
                    ServerEvent::Error {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    /// Handle a combat action against an active fight.
    pub fn handle_action(&self, req: ActionRequest) {
        let Some(mut fight) = self.registry.get_mut(&req.fight_id) else {
            debug!(fight_id = %req.fight_id, "action for unknown fight dropped");
            return;
        };

        match fight.resolve(&req.fighter_id, req.action, req.damage, req.blocking) {
            Outcome::Ignored => {
                drop(fight);
                debug!(fight_id = %req.fight_id, fighter = %req.fighter_id, "stale action dropped");
            }

            Outcome::StanceChanged => {}

            Outcome::Hit {
                attacker,
                damage,
                defender_health,
            } => {
                let attacker_conn = fight.fighter(attacker).map(|f| f.connection);
                let defender_conn = fight.fighter(attacker.other()).map(|f| f.connection);
                drop(fight);

                if let Some(conn) = defender_conn {
                    self.transport.send(
                        conn,
                        ServerEvent::OpponentAction {
                            action: req.action,
                            attack_type: req.attack_type.clone(),
                            damage,
                        },
                    );
                }
                if let Some(conn) = attacker_conn {
                    self.transport.send(
                        conn,
                        ServerEvent::DamageDealt {
                            damage,
                            opponent_health: defender_health,
                        },
                    );
                }
            }

            Outcome::Knockout {
                winner,
                damage,
                winner_health,
            } => {
                let epoch = fight.epoch;
                let winner_name = fight.fighter(winner).map(|f| f.name.clone());
                let winner_conn = fight.fighter(winner).map(|f| f.connection);
                let loser_conn = fight.fighter(winner.other()).map(|f| f.connection);
                drop(fight);

                if let Some(conn) = loser_conn {
                    self.transport.send(
                        conn,
                        ServerEvent::OpponentAction {
                            action: req.action,
                            attack_type: req.attack_type.clone(),
                            damage,
                        },
                    );
                }
                if let Some(conn) = winner_conn {
                    self.transport.send(
                        conn,
                        ServerEvent::DamageDealt {
                            damage,
                            opponent_health: 0,
                        },
                    );
                    self.transport.send(
                        conn,
                        ServerEvent::FightOver {
                            winner: true,
                            opponent_health: 0,
                        },
                    );
                }
                if let Some(conn) = loser_conn {
                    self.transport.send(
                        conn,
                        ServerEvent::FightOver {
                            winner: false,
                            opponent_health: winner_health,
                        },
                    );
                }

                info!(
                    fight_id = %req.fight_id,
                    winner = %winner_name.as_deref().unwrap_or("?"),
                    "fight finished"
                );
                self.reaper.schedule(
                    req.fight_id,
                    epoch,
                    self.reaper.config().finished_grace,
                );
            }
        }
    }

    /// Handle a dropped connection: notify whoever is left in the first
    /// fight referencing it and schedule the record's removal.
    pub fn handle_disconnect(&self, conn: ConnectionId) {
        let Some(fight_id) = self.registry.find_by_connection(conn) else {
            return;
        };
        let Some(fight) = self.registry.get(&fight_id) else {
            return;
        };

        let epoch = fight.epoch;
        let remaining: Vec<ConnectionId> = [Some(&fight.host), fight.challenger.as_ref()]
            .into_iter()
            .flatten()
            .map(|f| f.connection)
            .filter(|&c| c != conn)
            .collect();
        drop(fight);

        info!(fight_id = %fight_id, "fighter disconnected");
        for c in remaining {
            self.transport.send(c, ServerEvent::OpponentLeft);
        }
        self.reaper
            .schedule(fight_id, epoch, self.reaper.config().disconnect_grace);
    }
}

/// `FightStart` payload for the fighter in `seat`, describing the
/// opponent across from them.
fn start_event(fight: &Fight, seat: Seat) -> Option<ServerEvent> {
    let opponent = fight.fighter(seat.other())?;
    Some(ServerEvent::FightStart {
        opponent_name: opponent.name.clone(),
        opponent_character: opponent.character.clone(),
        is_host: seat == Seat::Host,
    })
}
