use std::collections::VecDeque;

const MAX_PENDING: usize = 32;

/// Gameplay notifications the core raises for the embedding mode to turn
/// into LED flashes, sounds, and scoreboard updates. Purely local; none
/// of these ride the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// A remote boolet connected with the local plane.
    HitByBoolet { token: u16 },
    /// Local health reached zero. `killer` is the token of the fatal shot.
    LocalDeath { killer: u16 },
    /// A peer died to one of our outstanding shots.
    KillConfirmed { peer_slot: usize },
    /// Broadcast text arrived; the text buffer holds the payload.
    TextReceived { color: u8 },
}

/// FIFO of pending match events. Oldest entries are dropped on overflow;
/// a missed LED flash is cheaper than unbounded growth.
#[derive(Debug, Default)]
pub struct MatchEvents {
    pending: VecDeque<MatchEvent>,
}

impl MatchEvents {
    pub fn push(&mut self, event: MatchEvent) {
        if self.pending.len() >= MAX_PENDING {
            self.pending.pop_front();
        }
        self.pending.push_back(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = MatchEvent> + '_ {
        self.pending.drain(..)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
