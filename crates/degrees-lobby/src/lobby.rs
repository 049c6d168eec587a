//! The state behind one lobby's lock.
//!
//! Everything here is synchronous; the registry takes the lock, calls
//! these methods, and broadcasts before releasing it.

use degrees_protocol::{LobbyCode, LobbySettings, PlayerId, PlayerInfo};

use crate::GamePhase;

/// A member of a lobby.
///
/// The connection is not stored here; the [`Fanout`](crate::Fanout) maps
/// the id to whatever sender is currently registered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
}

impl Participant {
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            is_host: self.is_host,
            is_ready: self.is_ready,
        }
    }
}

/// What [`Lobby::remove`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub participant: Participant,
    /// The participant promoted to host, if the host left and someone
    /// remained.
    pub promoted: Option<PlayerId>,
}

/// One lobby.
///
/// Invariant: while `participants` is non-empty exactly one of them is
/// host. `closed` is set when the last participant leaves; a closed lobby
/// accepts nothing and is about to disappear from the registry.
#[derive(Debug)]
pub struct Lobby {
    code: LobbyCode,
    participants: Vec<Participant>,
    settings: LobbySettings,
    phase: GamePhase,
    closed: bool,
}

impl Lobby {
    /// A new lobby whose creator is host and already ready.
    pub fn new(code: LobbyCode, host_id: PlayerId, host_name: String) -> Self {
        Self {
            code,
            participants: vec![Participant {
                id: host_id,
                name: host_name,
                is_host: true,
                is_ready: true,
            }],
            settings: LobbySettings::default(),
            phase: GamePhase::Waiting,
            closed: false,
        }
    }

    pub fn code(&self) -> &LobbyCode {
        &self.code
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.participant(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn settings(&self) -> &LobbySettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut LobbySettings {
        &mut self.settings
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: GamePhase) {
        self.phase = phase;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.participants.iter().find(|p| p.is_host).map(|p| p.id)
    }

    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host_id() == Some(id)
    }

    /// `true` if there is at least one participant and all are ready.
    pub fn all_ready(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.is_ready)
    }

    /// Appends a non-host, non-ready participant.
    pub fn add(&mut self, id: PlayerId, name: String) -> &Participant {
        let index = self.participants.len();
        self.participants.push(Participant {
            id,
            name,
            is_host: false,
            is_ready: false,
        });
        &self.participants[index]
    }

    /// Sets a participant's ready flag. Returns `false` if there is no
    /// such participant.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> bool {
        match self.participants.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.is_ready = ready;
                true
            }
            None => false,
        }
    }

    /// Removes a participant, keeping the others in order. If the host
    /// left, the first remaining participant becomes host. An emptied
    /// lobby is marked closed.
    pub fn remove(&mut self, id: PlayerId) -> Option<Removal> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        let participant = self.participants.remove(index);

        let promoted = match self.participants.first_mut() {
            Some(first) if participant.is_host => {
                first.is_host = true;
                Some(first.id)
            }
            _ => None,
        };
        if self.participants.is_empty() {
            self.closed = true;
        }

        Some(Removal {
            participant,
            promoted,
        })
    }

    /// Snapshot of every participant as clients see them.
    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        self.participants.iter().map(Participant::info).collect()
    }
}
