use glam::{I8Vec3, I16Vec3, IVec3};

use crate::codec::BitReader;
use crate::peer::integrate;

pub const MAX_NETWORK_MODELS: usize = 172;

/// Network models age out on the same 10-second window as peers.
pub const MODEL_STALE_US: u32 = 10_000_000;

/// The schema codeword dedicates 4 bits to `boneCount - 1`, so a hostile
/// packet can never claim more than this many bones.
pub const MAX_BONES: usize = 16;

/// An arbitrarily-shaped skeletal entity broadcast by a peer: a root with
/// velocity and a chain of relative bone offsets. The codeword packs the
/// model id, the bone count, and the per-bone draw/continue flag stream;
/// it doubles as the schema key, so a changed codeword means the bone
/// storage must be rebuilt before the payload is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkModel {
    pub last_update: u32,
    pub codeword: u32,
    pub root: I16Vec3,
    pub radius: u8,
    pub color: u8,
    pub vel: I8Vec3,
    pub bones: Vec<I8Vec3>,
}

impl NetworkModel {
    fn sized_for(codeword: u32) -> Self {
        Self {
            last_update: 0,
            codeword,
            root: I16Vec3::ZERO,
            radius: 0,
            color: 0,
            vel: I8Vec3::ZERO,
            bones: vec![I8Vec3::ZERO; bone_count(codeword)],
        }
    }

    pub fn bone_count(&self) -> usize {
        bone_count(self.codeword)
    }

    pub fn position_at(&self, now: u32) -> IVec3 {
        integrate(self.root, self.vel, now.wrapping_sub(self.last_update) as i32)
    }

    pub fn is_stale(&self, now: u32) -> bool {
        now.wrapping_sub(self.last_update) as i32 > MODEL_STALE_US as i32
    }
}

/// Decode the bone count from a schema codeword (1..=16).
pub fn bone_count(codeword: u32) -> usize {
    let mut bits = BitReader::new(codeword);
    bits.read_uq(8); // model id
    bits.read_uq(4) as usize + 1
}

/// Sparse pool of network models, indexed directly by the small wire id.
#[derive(Debug, Default)]
pub struct NetworkModelPool {
    slots: Vec<Option<NetworkModel>>,
}

impl NetworkModelPool {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_NETWORK_MODELS).map(|_| None).collect(),
        }
    }

    fn clamp_id(id: u32) -> usize {
        if (id as usize) < MAX_NETWORK_MODELS {
            id as usize
        } else {
            0
        }
    }

    /// Make the slot ready for an update with this codeword: reuse the
    /// existing storage when the schema is unchanged, otherwise replace it
    /// with one sized exactly for the new bone count. Returns the clamped
    /// slot index alongside the model.
    pub fn prepare(&mut self, id: u32, codeword: u32) -> (usize, &mut NetworkModel) {
        let idx = Self::clamp_id(id);
        let slot = &mut self.slots[idx];
        if slot.as_ref().is_some_and(|m| m.codeword != codeword) {
            *slot = None;
        }
        let model = slot.get_or_insert_with(|| NetworkModel::sized_for(codeword));
        (idx, model)
    }

    pub fn get(&self, idx: usize) -> Option<&NetworkModel> {
        self.slots.get(idx).and_then(|s| s.as_ref())
    }

    pub fn slots_mut(&mut self) -> &mut [Option<NetworkModel>] {
        &mut self.slots
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
