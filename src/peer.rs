use bitflags::bitflags;
use glam::{I8Vec3, I16Vec3, IVec3};

use crate::clock::PeerClock;

/// Link-layer address identifying a remote device for the session.
pub type Mac = [u8; 6];

/// Directory capacity. Prime, and larger than any plausible crowd, since
/// the table is open-addressed and never evicts a live peer.
pub const MAX_PEERS: usize = 103;

/// Linear probing gives up after this many slots; a table that full is
/// not worth fighting over and the update is dropped instead.
pub const PROBE_BOUND: usize = 12;

/// A peer with no parsed update for this long is excluded from rendering
/// and collision, and its slot becomes reclaimable.
pub const PEER_STALE_US: u32 = 10_000_000;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PeerFlags: u8 {
        const PRESENT = 1;
        const DEAD = 2;
    }
}

/// Locally-held shadow state for one remote player.
#[derive(Debug, Clone, Copy, Default)]
pub struct Peer {
    pub mac: Mac,
    pub clock: PeerClock,
    /// Local time of the last successfully parsed update.
    pub last_update: u32,
    pub pos: I16Vec3,
    /// Scaled velocity: world delta = (vel * elapsed_us) >> 16.
    pub vel: I8Vec3,
    /// Reduced-precision heading/pitch/roll.
    pub rot: [i8; 3],
    pub flags: PeerFlags,
    /// Killer boolet token while DEAD; free for reuse otherwise.
    pub aux_flags: u16,
    /// Drives the death animation. Saturates at 255.
    pub frames_dead: u8,
    pub color: u8,
}

impl Peer {
    pub fn position_at(&self, now: u32) -> IVec3 {
        integrate(self.pos, self.vel, now.wrapping_sub(self.last_update) as i32)
    }

    pub fn is_stale(&self, now: u32) -> bool {
        now.wrapping_sub(self.last_update) as i32 > PEER_STALE_US as i32
    }
}

/// Dead-reckon a quantized position forward by `dt_us` microseconds.
pub(crate) fn integrate(pos: I16Vec3, vel: I8Vec3, dt_us: i32) -> IVec3 {
    IVec3::new(
        pos.x as i32 + ((vel.x as i32 * dt_us) >> 16),
        pos.y as i32 + ((vel.y as i32 * dt_us) >> 16),
        pos.z as i32 + ((vel.z as i32 * dt_us) >> 16),
    )
}

/// Open-addressed table of remote players keyed by MAC, plus one dedicated
/// slot for the optional authoritative sender (which is identified by its
/// packet framing, not its address).
#[derive(Debug)]
pub struct PeerDirectory {
    slots: Vec<Peer>,
    pub authority: Peer,
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self {
            slots: vec![Peer::default(); MAX_PEERS],
            authority: Peer::default(),
        }
    }

    pub fn hash(mac: &Mac) -> usize {
        let mut h = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]])
            .wrapping_add(u16::from_le_bytes([mac[4], mac[5]]) as u32);
        h ^= ((h >> 11).wrapping_mul(51)) ^ ((h >> 22).wrapping_mul(37));
        h as usize % MAX_PEERS
    }

    /// Find the slot holding `mac`, or claim one for it. Returns the slot
    /// index and whether it was newly claimed. `None` means the probe
    /// window held neither the address nor a free slot, and the caller
    /// should drop the update.
    pub fn lookup_or_insert(&mut self, mac: &Mac) -> Option<(usize, bool)> {
        let mut idx = Self::hash(mac);
        let mut free = None;
        for _ in 0..PROBE_BOUND {
            let slot = &self.slots[idx];
            if slot.flags.is_empty() && free.is_none() {
                free = Some(idx);
            }
            if slot.mac == *mac {
                return Some((idx, false));
            }
            idx = (idx + 1) % MAX_PEERS;
        }
        let idx = free?;
        self.slots[idx] = Peer {
            mac: *mac,
            flags: PeerFlags::PRESENT,
            ..Peer::default()
        };
        Some((idx, true))
    }

    pub fn find(&self, mac: &Mac) -> Option<usize> {
        let mut idx = Self::hash(mac);
        for _ in 0..PROBE_BOUND {
            if self.slots[idx].mac == *mac && !self.slots[idx].flags.is_empty() {
                return Some(idx);
            }
            idx = (idx + 1) % MAX_PEERS;
        }
        None
    }

    pub fn get(&self, idx: usize) -> &Peer {
        &self.slots[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Peer {
        &mut self.slots[idx]
    }

    pub fn slots(&self) -> &[Peer] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Peer] {
        &mut self.slots
    }

    /// Wipe every tracked peer. Used when an authoritative sender takes
    /// over, so stale peer-to-peer state cannot mix with its world view.
    pub fn clear(&mut self) {
        self.slots.fill(Peer::default());
    }

    pub fn present_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|p| p.flags.contains(PeerFlags::PRESENT))
            .count()
    }
}
