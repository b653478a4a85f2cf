use glam::{I16Vec3, IVec3};

use crate::peer::MAX_PEERS;

pub const BOOLETS_PER_PLAYER: usize = 4;
pub const MAX_BOOLETS_FROM_AUTHORITY: usize = 96;
pub const MAX_BOOLETS: usize = MAX_PEERS * BOOLETS_PER_PLAYER + MAX_BOOLETS_FROM_AUTHORITY;

/// A boolet expires this long after launch regardless of what it hit.
pub const BOOLET_MAX_AGE_US: u32 = 8_000_000;

/// Elapsed microseconds shift right by this to get world-space travel.
const BOOLET_SPEED_SHIFT: i32 = 11;

/// Squared hit distance against the local plane.
pub const BOOLET_HIT_DIST_SQ: i32 = 2400;

pub const BOOLET_RADIUS: i32 = 50;

/// Angles on the wire are stored in 1/11-degree steps.
const ANGLE_SCALE: i32 = 11;

/// Quarter-wave sine table, `round(sin(deg) * 1024)` for 0..=90 degrees.
/// All direction math stays in integers; no floating point anywhere on the
/// kinematics path.
const SIN_1024: [i16; 91] = [
    0, 18, 36, 54, 71, 89, 107, 125, 143, 160, 178, 195, 213,
    230, 248, 265, 282, 299, 316, 333, 350, 367, 384, 400, 416, 433,
    449, 465, 481, 496, 512, 527, 543, 558, 573, 587, 602, 616, 630,
    644, 658, 672, 685, 698, 711, 724, 737, 749, 761, 773, 784, 796,
    807, 818, 828, 839, 849, 859, 868, 878, 887, 896, 904, 912, 920,
    928, 935, 943, 949, 956, 962, 968, 974, 979, 984, 989, 994, 998,
    1002, 1005, 1008, 1011, 1014, 1016, 1018, 1020, 1022, 1023, 1023, 1024,
    1024,
];

pub(crate) fn sin1024(deg: i32) -> i32 {
    let d = deg.rem_euclid(360);
    let (half, sign) = if d >= 180 { (d - 180, -1) } else { (d, 1) };
    let idx = if half > 90 { 180 - half } else { half };
    sign * SIN_1024[idx as usize] as i32
}

pub(crate) fn cos1024(deg: i32) -> i32 {
    sin1024(deg + 90)
}

/// One fired shot. The token doubles as the liveness flag (zero = free
/// slot) and as the cross-reference key other devices use to recognize a
/// shot they have already seen. Position is always derived from the
/// launch data, never stored, so dropped packets cost nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boolet {
    pub launch_time: u32,
    pub launch_pos: I16Vec3,
    /// Yaw and pitch at launch, 1/11-degree units.
    pub launch_rot: [i16; 2],
    pub token: u16,
}

impl Boolet {
    pub fn is_live(&self) -> bool {
        self.token != 0
    }

    pub fn is_expired(&self, now: u32) -> bool {
        now.wrapping_sub(self.launch_time) as i32 > BOOLET_MAX_AGE_US as i32
    }

    /// Flight direction, 1024-scaled.
    pub fn direction(&self) -> IVec3 {
        let yaw = self.launch_rot[0] as i32 / ANGLE_SCALE;
        let pitch = self.launch_rot[1] as i32 / ANGLE_SCALE;
        let pitch_cos = cos1024(pitch);
        IVec3::new(
            (sin1024(yaw) * pitch_cos) >> 10,
            -sin1024(pitch),
            (cos1024(yaw) * pitch_cos) >> 10,
        )
    }

    /// Pure function of the launch data and `now`; two calls with the same
    /// time always agree.
    pub fn position_at(&self, now: u32) -> IVec3 {
        let travelled = (now.wrapping_sub(self.launch_time) as i32) >> BOOLET_SPEED_SHIFT;
        let dir = self.direction();
        IVec3::new(
            self.launch_pos.x as i32 + ((travelled * dir.x) >> 10),
            self.launch_pos.y as i32 + ((travelled * dir.y) >> 10),
            self.launch_pos.z as i32 + ((travelled * dir.z) >> 10),
        )
    }
}

/// The local player's shots: a small ring that overwrites its oldest
/// entry on overflow rather than ever refusing a trigger pull.
#[derive(Debug, Default)]
pub struct SelfBoolets {
    shots: [Boolet; BOOLETS_PER_PLAYER],
    head: usize,
}

impl SelfBoolets {
    /// Place a shot in the next ring slot. Returns the post-advance head,
    /// which alternates the gun barrel the shot appears to come from.
    pub fn fire(&mut self, shot: Boolet) -> usize {
        self.shots[self.head] = shot;
        self.head = (self.head + 1) % BOOLETS_PER_PLAYER;
        self.head
    }

    /// Ring position the next shot will land in.
    pub(crate) fn head(&self) -> usize {
        self.head
    }

    /// Self-immunity check: is this token one of our own outstanding shots?
    pub fn owns_token(&self, token: u16) -> bool {
        token != 0 && self.shots.iter().any(|b| b.token == token)
    }

    pub fn shots(&self) -> &[Boolet; BOOLETS_PER_PLAYER] {
        &self.shots
    }

    pub fn shots_mut(&mut self) -> &mut [Boolet; BOOLETS_PER_PLAYER] {
        &mut self.shots
    }

    pub fn live_count(&self) -> usize {
        self.shots.iter().filter(|b| b.is_live()).count()
    }
}

/// Which framing an inbound packet carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderClass {
    Peer,
    Authority,
}

/// Every remote shot, one pool. Peers get fixed contiguous blocks keyed by
/// their directory slot; an authoritative sender's shots land after all
/// peer blocks, or at the pool base when it has taken over exclusively.
#[derive(Debug)]
pub struct RemoteBoolets {
    slots: Vec<Boolet>,
}

impl Default for RemoteBoolets {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteBoolets {
    pub fn new() -> Self {
        Self {
            slots: vec![Boolet::default(); MAX_BOOLETS],
        }
    }

    pub fn slot_for(sender: SenderClass, peer_slot: usize, local_index: u8, exclusive: bool) -> usize {
        match sender {
            SenderClass::Peer => {
                let idx = if (local_index as usize) < BOOLETS_PER_PLAYER {
                    local_index as usize
                } else {
                    0
                };
                peer_slot * BOOLETS_PER_PLAYER + idx
            }
            SenderClass::Authority => {
                let mut idx = local_index as usize;
                if !exclusive {
                    idx += MAX_PEERS * BOOLETS_PER_PLAYER;
                }
                if idx >= MAX_BOOLETS { 0 } else { idx }
            }
        }
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Boolet {
        &mut self.slots[idx]
    }

    pub fn slots(&self) -> &[Boolet] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Boolet] {
        &mut self.slots
    }
}

/// Tokens that already damaged the local player. A boolet lives for many
/// frames after it first connects; remembering the last few hits keeps one
/// shot from draining health every frame until it retires.
#[derive(Debug, Default)]
pub struct HitHistory {
    tokens: [u16; BOOLETS_PER_PLAYER],
    head: usize,
}

impl HitHistory {
    pub fn contains(&self, token: u16) -> bool {
        token != 0 && self.tokens.contains(&token)
    }

    pub fn record(&mut self, token: u16) {
        self.tokens[self.head] = token;
        self.head = (self.head + 1) % self.tokens.len();
    }
}
