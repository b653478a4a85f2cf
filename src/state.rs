use glam::{I8Vec3, I16Vec3, IVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::boolet::{
    BOOLET_HIT_DIST_SQ, BOOLET_RADIUS, BOOLETS_PER_PLAYER, Boolet, HitHistory, RemoteBoolets,
    SelfBoolets, cos1024, sin1024,
};
use crate::event::{MatchEvent, MatchEvents};
use crate::netmodel::NetworkModelPool;
use crate::packet::{self, NET_TEXT_CAP, PacketError, ShipUpdate};
use crate::peer::{Mac, PeerDirectory, PeerFlags};
use crate::render::{self, RenderEntry, RenderQueue, RenderRef, StaticBounds, Viewport};

/// Best-effort outbound broadcast. One call per rate-limited update; no
/// acknowledgement ever comes back.
pub trait Transport {
    fn send(&mut self, payload: &[u8]);
}

/// Match tuning. Defaults match the shipped mode; an embedding game can
/// deserialize overrides from its settings store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Outbound update period (10 Hz keeps channel load bounded).
    pub update_interval_us: u32,
    pub fire_cooldown_us: u32,
    /// Shots are post-dated to reduce missed close-range hits.
    pub launch_postdate_us: u32,
    pub boolet_damage: i32,
    pub start_health: i32,
    /// Frames an authoritative sender suppresses ordinary peers for.
    pub exclusive_frames: u32,
    /// Visibility padding radius for remote ships.
    pub ship_radius: i32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            update_interval_us: 100_000,
            fire_cooldown_us: 300_000,
            launch_postdate_us: 50_000,
            boolet_damage: 10,
            start_health: 100,
            exclusive_frames: 300,
            ship_radius: 64,
        }
    }
}

/// Broadcast text as carried on the wire: color byte first, then ASCII.
#[derive(Debug, Clone, Copy)]
pub struct NetText {
    buf: [u8; NET_TEXT_CAP],
    len: u8,
}

impl Default for NetText {
    fn default() -> Self {
        Self {
            buf: [0; NET_TEXT_CAP],
            len: 0,
        }
    }
}

impl NetText {
    /// Text longer than the wire allows is truncated. Receivers only accept
    /// a raw length strictly below the buffer cap, so the color byte plus
    /// the text must leave one byte of headroom.
    pub fn new(color: u8, text: &[u8]) -> Self {
        let mut t = Self::default();
        t.buf[0] = color;
        let n = text.len().min(NET_TEXT_CAP - 2);
        t.buf[1..1 + n].copy_from_slice(&text[..n]);
        t.len = (n + 1) as u8;
        t
    }

    pub(crate) fn set_raw(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= NET_TEXT_CAP);
        self.buf[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len() as u8;
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn color(&self) -> Option<u8> {
        (self.len > 0).then(|| self.buf[0])
    }

    pub fn text(&self) -> &[u8] {
        if self.len > 1 {
            &self.buf[1..self.len as usize]
        } else {
            &[]
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The local plane as the rest of the game simulates it. The embedding
/// mode refreshes this every tick; the core only reads it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalShip {
    pub pos: I16Vec3,
    /// Same scale as peer velocity: world delta = (vel * dt_us) >> 16.
    pub vel: I8Vec3,
    /// Heading/pitch/roll in 1/11-degree units.
    pub hpr: [i16; 3],
}

/// Everything the multiplayer mode owns: the peer directory, the three
/// entity pools, the render-queue scratch, and local combat bookkeeping.
/// Created on mode entry, dropped on exit; no global state anywhere.
#[derive(Debug)]
pub struct MultiplayerState {
    pub tuning: Tuning,
    pub directory: PeerDirectory,
    pub remote_boolets: RemoteBoolets,
    pub net_models: NetworkModelPool,
    pub my_boolets: SelfBoolets,
    pub events: MatchEvents,
    pub ship: LocalShip,
    queue: RenderQueue,
    hit_history: HitHistory,
    pub(crate) net_text: NetText,
    broadcast_text: Option<NetText>,
    pub(crate) health: i32,
    pub(crate) killed_by: u16,
    pub(crate) was_hit: bool,
    pub(crate) kills: u32,
    pub(crate) deaths: u32,
    time_of_death: u32,
    /// Countdown of frames left in authoritative-exclusive mode.
    pub(crate) exclusive_frames: u32,
    last_net_update: u32,
    time_of_last_shot: u32,
    send_buf: Vec<u8>,
    rng: StdRng,
}

impl Default for MultiplayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplayerState {
    pub fn new() -> Self {
        Self::with_tuning(Tuning::default())
    }

    pub fn with_tuning(tuning: Tuning) -> Self {
        let health = tuning.start_health;
        Self {
            tuning,
            directory: PeerDirectory::new(),
            remote_boolets: RemoteBoolets::new(),
            net_models: NetworkModelPool::new(),
            my_boolets: SelfBoolets::default(),
            events: MatchEvents::default(),
            ship: LocalShip::default(),
            queue: RenderQueue::default(),
            hit_history: HitHistory::default(),
            net_text: NetText::default(),
            broadcast_text: None,
            health,
            killed_by: 0,
            was_hit: false,
            kills: 0,
            deaths: 0,
            time_of_death: 0,
            exclusive_frames: 0,
            last_net_update: 0,
            time_of_last_shot: 0,
            send_buf: Vec::with_capacity(packet::MAX_PACKET_SIZE),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn set_local_ship(&mut self, pos: I16Vec3, vel: I8Vec3, hpr: [i16; 3]) {
        self.ship = LocalShip { pos, vel, hpr };
    }

    /// Queue text for the next outbound updates (or `None` to stop).
    pub fn set_broadcast_text(&mut self, text: Option<NetText>) {
        self.broadcast_text = text;
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    pub fn time_of_death(&self) -> u32 {
        self.time_of_death
    }

    pub fn killed_by(&self) -> u16 {
        self.killed_by
    }

    pub fn net_text(&self) -> &NetText {
        &self.net_text
    }

    pub fn in_exclusive_mode(&self) -> bool {
        self.exclusive_frames > 0
    }

    pub fn respawn(&mut self) {
        self.health = self.tuning.start_health;
        self.killed_by = 0;
        self.was_hit = false;
    }

    /// Trigger-pull entry point. Rate-limited; overwrites the oldest ring
    /// slot when all four shots are in flight.
    pub fn fire_boolet(&mut self, now: u32) -> bool {
        if (now.wrapping_sub(self.time_of_last_shot) as i32)
            <= self.tuning.fire_cooldown_us as i32
        {
            return false;
        }
        self.time_of_last_shot = now;

        // Shots alternate barrels; the offset side follows the parity of
        // the ring head after this shot claims its slot.
        let next_head = (self.my_boolets.head() + 1) % BOOLETS_PER_PLAYER;
        let eo_sign = if next_head & 1 == 1 { 1 } else { -1 };
        let yaw = self.ship.hpr[0] as i32 / 11;
        let roll = self.ship.hpr[2] as i32 / 11;
        let barrel = IVec3::new(
            (-eo_sign * (cos1024(yaw) * cos1024(roll))) >> 16,
            eo_sign * (sin1024(roll) >> 6),
            (eo_sign * (sin1024(yaw) * cos1024(roll))) >> 16,
        );

        let shot = Boolet {
            launch_time: now.wrapping_add(self.tuning.launch_postdate_us),
            launch_pos: I16Vec3::new(
                (self.ship.pos.x as i32 + barrel.x) as i16,
                (self.ship.pos.y as i32 + barrel.y) as i16,
                (self.ship.pos.z as i32 + barrel.z) as i16,
            ),
            launch_rot: [self.ship.hpr[0], self.ship.hpr[1]],
            token: self.rng.gen_range(1..=u16::MAX),
        };
        self.my_boolets.fire(shot);
        true
    }

    /// Transport receive callback: decode one inbound packet into the
    /// directory and pools. Malformed input aborts the rest of that
    /// packet only; nothing here is fatal.
    pub fn handle_receive(&mut self, mac: &Mac, data: &[u8], now: u32) -> Result<(), PacketError> {
        let result = packet::decode_update(self, mac, data, now);
        if let Err(ref e) = result {
            log::debug!("dropping rest of packet from {mac:02x?}: {e}");
        }
        result
    }

    /// Gather this frame's visible entities into the render queue and run
    /// boolet-vs-me collision, then depth-sort for the painter's pass.
    pub fn build_frame<V: Viewport>(&mut self, now: u32, viewport: &V, statics: &[StaticBounds]) {
        self.queue.clear();
        if self.exclusive_frames > 0 {
            self.exclusive_frames -= 1;
        }

        for (i, s) in statics.iter().enumerate() {
            self.queue
                .push_visible(viewport, RenderRef::Static(i), s.center, s.radius);
        }

        let ship_radius = self.tuning.ship_radius;
        for (i, p) in self.directory.slots_mut().iter_mut().enumerate() {
            if p.flags.is_empty() {
                continue;
            }
            if p.is_stale(now) {
                p.flags = PeerFlags::empty();
                continue;
            }
            let center = p.position_at(now);
            self.queue
                .push_visible(viewport, RenderRef::Peer(i), center, ship_radius);
        }

        for (i, slot) in self.net_models.slots_mut().iter_mut().enumerate() {
            let Some(m) = slot else { continue };
            if m.is_stale(now) {
                *slot = None;
                continue;
            }
            let center = m.position_at(now);
            let radius = m.radius as i32;
            self.queue
                .push_visible(viewport, RenderRef::NetModel(i), center, radius);
        }

        let plane = IVec3::new(
            self.ship.pos.x as i32,
            self.ship.pos.y as i32,
            self.ship.pos.z as i32,
        );
        let damage = self.tuning.boolet_damage;
        for (i, b) in self.remote_boolets.slots_mut().iter_mut().enumerate() {
            if !b.is_live() {
                continue;
            }
            if b.is_expired(now) {
                b.token = 0;
                continue;
            }
            let center = b.position_at(now);
            self.queue
                .push_visible(viewport, RenderRef::RemoteBoolet(i), center, BOOLET_RADIUS);

            // Collision runs whether or not the boolet is on screen. The
            // deltas span the whole world, so the squares are summed wide.
            let d = center - plane;
            let dist_sq =
                d.x as i64 * d.x as i64 + d.y as i64 * d.y as i64 + d.z as i64 * d.z as i64;
            if dist_sq >= BOOLET_HIT_DIST_SQ as i64 || self.health <= 0 {
                continue;
            }
            if self.my_boolets.owns_token(b.token) || self.hit_history.contains(b.token) {
                continue;
            }
            self.hit_history.record(b.token);
            self.was_hit = true;
            self.health -= damage;
            self.events.push(MatchEvent::HitByBoolet { token: b.token });
            if self.health <= 0 {
                self.killed_by = b.token;
                self.time_of_death = now;
                self.deaths += 1;
                self.events.push(MatchEvent::LocalDeath { killer: b.token });
            }
        }

        for (i, b) in self.my_boolets.shots_mut().iter_mut().enumerate() {
            if !b.is_live() {
                continue;
            }
            if b.is_expired(now) {
                b.token = 0;
                continue;
            }
            let center = b.position_at(now);
            self.queue
                .push_visible(viewport, RenderRef::SelfBoolet(i), center, BOOLET_RADIUS);
        }

        self.queue.sort_back_to_front();
    }

    /// Painter's pass over the sorted queue: dispatch each entry to its
    /// pool's draw routine, farthest first.
    pub fn draw_frame<V: Viewport>(&mut self, now: u32, viewport: &mut V) {
        for i in 0..self.queue.len() {
            let entry = self.queue.entries()[i];
            match entry.what {
                RenderRef::Static(idx) => viewport.draw_static(idx),
                RenderRef::SelfBoolet(idx) => {
                    render::draw_boolet(&self.my_boolets.shots()[idx], now, viewport);
                }
                RenderRef::RemoteBoolet(idx) => {
                    render::draw_boolet(&self.remote_boolets.slots()[idx], now, viewport);
                }
                RenderRef::Peer(idx) => {
                    render::draw_peer(self.directory.get_mut(idx), now, viewport);
                }
                RenderRef::NetModel(idx) => {
                    if let Some(m) = self.net_models.get(idx) {
                        render::draw_net_model(m, now, viewport);
                    }
                }
            }
        }
    }

    /// Rate-limited outbound update: at most one broadcast per tuned
    /// interval, built synchronously within the frame.
    pub fn net_tick<T: Transport>(&mut self, now: u32, transport: &mut T) {
        if (now.wrapping_sub(self.last_net_update) as i32) <= self.tuning.update_interval_us as i32
        {
            return;
        }
        self.last_net_update = now;

        let ship = ShipUpdate {
            pos: self.ship.pos,
            vel: self.ship.vel,
            rot: [
                (self.ship.hpr[0] >> 4) as i8,
                (self.ship.hpr[1] >> 4) as i8,
                (self.ship.hpr[2] >> 4) as i8,
            ],
            dead: self.health <= 0,
            killed_by: self.killed_by,
            color_hint: if self.was_hit { 92 } else { 5 },
        };
        self.was_hit = false;

        self.send_buf.clear();
        packet::encode_update(
            &mut self.send_buf,
            now,
            &ship,
            self.my_boolets.shots(),
            self.broadcast_text.as_ref(),
        );
        transport.send(&self.send_buf);
    }

    /// Convenience wrapper for the whole per-frame network pass.
    pub fn frame<V: Viewport, T: Transport>(
        &mut self,
        now: u32,
        viewport: &mut V,
        statics: &[StaticBounds],
        transport: &mut T,
    ) {
        self.build_frame(now, &*viewport, statics);
        self.draw_frame(now, viewport);
        self.net_tick(now, transport);
    }

    pub fn queue(&self) -> &[RenderEntry] {
        self.queue.entries()
    }
}
