use glam::IVec3;

use crate::boolet::Boolet;
use crate::codec::BitReader;
use crate::netmodel::NetworkModel;
use crate::peer::Peer;

pub const BOOLET_COLOR: u8 = 198; // bright yellow-orange
pub const EXPLOSION_COLOR: u8 = 180; // red
const EXPLOSION_SEGMENTS: usize = 16;

pub type ScreenPoint = (i16, i16);

/// The projection and rasterization collaborator. Visibility and screen
/// mapping run against the caller's current camera matrices; drawing goes
/// straight to its framebuffer.
pub trait Viewport {
    /// Screen-space bounding test for a center and padding radius.
    /// `Some(range)` accepts, with larger ranges farther from the camera;
    /// `None` rejects.
    fn test_visibility(&self, center: IVec3, radius: i32) -> Option<i32>;

    /// Project one world point; `None` when behind the camera or wildly
    /// off-screen.
    fn to_screen(&self, point: IVec3) -> Option<ScreenPoint>;

    fn draw_line(&mut self, a: ScreenPoint, b: ScreenPoint, color: u8);

    /// Draw one static world model, previously offered via `StaticBounds`.
    fn draw_static(&mut self, index: usize);

    /// Draw a remote ship at a derived position with its reduced-precision
    /// orientation and requested color.
    fn draw_ship(&mut self, center: IVec3, rot: [i8; 3], color: u8);
}

/// Per-frame visibility input for one static world model.
#[derive(Debug, Clone, Copy)]
pub struct StaticBounds {
    pub center: IVec3,
    pub radius: i32,
}

/// What a render-queue entry points at. A closed enum keeps every pool in
/// one sortable list with O(1) dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRef {
    Static(usize),
    SelfBoolet(usize),
    RemoteBoolet(usize),
    Peer(usize),
    NetModel(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct RenderEntry {
    pub what: RenderRef,
    pub depth: i32,
}

/// The frame's draw list. Scratch storage is retained across frames so a
/// steady scene allocates nothing.
#[derive(Debug, Default)]
pub struct RenderQueue {
    entries: Vec<RenderEntry>,
}

impl RenderQueue {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Visibility-test a candidate and append it on acceptance. Returns
    /// whether the entry was kept.
    pub fn push_visible<V: Viewport>(
        &mut self,
        viewport: &V,
        what: RenderRef,
        center: IVec3,
        radius: i32,
    ) -> bool {
        match viewport.test_visibility(center, radius) {
            Some(depth) => {
                self.entries.push(RenderEntry { what, depth });
                true
            }
            None => false,
        }
    }

    /// Painter's algorithm: farthest first. Ties are broken arbitrarily.
    pub fn sort_back_to_front(&mut self) {
        self.entries.sort_unstable_by(|a, b| b.depth.cmp(&a.depth));
    }

    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Draw one boolet as a short motion-streak line along its direction of
/// travel.
pub fn draw_boolet<V: Viewport>(b: &Boolet, now: u32, viewport: &mut V) {
    let center = b.position_at(now);
    let dir = b.direction();
    let tail = center + IVec3::new(dir.x >> 3, dir.y >> 3, dir.z >> 3);
    let (Some(s), Some(e)) = (viewport.to_screen(center), viewport.to_screen(tail)) else {
        return;
    };
    viewport.draw_line((s.0, s.1 + 1), (e.0, e.1 - 1), BOOLET_COLOR);
}

fn scatter_hash(seed: &mut u32) -> i16 {
    *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    (*seed >> 16) as i16
}

/// Draw one peer: the ship itself while alive, or an expanding debris
/// cloud once dead. The scatter is a cheap LCG seeded by the killer token
/// so every frame (and every observer) explodes the same ship the same
/// way, growing with `frames_dead`.
pub fn draw_peer<V: Viewport>(peer: &mut Peer, now: u32, viewport: &mut V) {
    let center = peer.position_at(now);
    if peer.frames_dead == 0 {
        viewport.draw_ship(center, peer.rot, peer.color);
        return;
    }

    let spread = peer.frames_dead as i32;
    let mut seed = peer.aux_flags as u32;
    for _ in 0..EXPLOSION_SEGMENTS {
        let a = center
            + IVec3::new(
                (scatter_hash(&mut seed) as i32 * spread) >> 14,
                (scatter_hash(&mut seed) as i32 * spread) >> 14,
                (scatter_hash(&mut seed) as i32 * spread) >> 14,
            );
        let b = a
            + IVec3::new(
                scatter_hash(&mut seed) as i32 >> 10,
                scatter_hash(&mut seed) as i32 >> 10,
                scatter_hash(&mut seed) as i32 >> 10,
            );
        if let (Some(sa), Some(sb)) = (viewport.to_screen(a), viewport.to_screen(b)) {
            viewport.draw_line(sa, sb, EXPLOSION_COLOR);
        }
    }
    peer.frames_dead = peer.frames_dead.saturating_add(1);
}

/// Walk a network model's bone chain, drawing the flagged segments. The
/// codeword's flag stream marks each bone draw-or-skip; a 00 pair resets
/// the chain back to the root before continuing.
pub fn draw_net_model<V: Viewport>(model: &NetworkModel, now: u32, viewport: &mut V) {
    let root = model.position_at(now);
    let root_screen = viewport.to_screen(root);

    let mut bits = BitReader::new(model.codeword);
    bits.read_uq(8); // model id
    let bone_count = bits.read_uq(4) as usize + 1;

    let mut last = root;
    let mut last_screen = root_screen;
    for bone in model.bones.iter().take(bone_count) {
        let mut draw = bits.read_uq(1);
        if draw == 0 && bits.peek_uq(1) == 0 {
            bits.read_uq(1);
            last = root;
            last_screen = root_screen;
            draw = bits.read_uq(1);
        }

        let next = last + IVec3::new(bone.x as i32, bone.y as i32, bone.z as i32);
        let next_screen = viewport.to_screen(next);
        if draw != 0
            && let (Some(a), Some(b)) = (last_screen, next_screen)
        {
            viewport.draw_line(a, b, model.color);
        }
        last = next;
        last_screen = next_screen;
    }
}
