use glam::{I8Vec3, I16Vec3, IVec3};

use dogfight::{
    BitWriter, MAGIC_AUTHORITY, MAX_PEERS, MatchEvent, MultiplayerState, RenderRef, Transport,
    Viewport,
};

const MAC_A: [u8; 6] = [0xAA, 0x01, 0x02, 0x03, 0x04, 0x05];
const MAC_B: [u8; 6] = [0xBB, 0x06, 0x07, 0x08, 0x09, 0x0A];
const MAC_SRV: [u8; 6] = [0xEE, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F];

/// Collects outbound payloads instead of broadcasting them.
#[derive(Default)]
struct Capture {
    sent: Vec<Vec<u8>>,
}

impl Transport for Capture {
    fn send(&mut self, payload: &[u8]) {
        self.sent.push(payload.to_vec());
    }
}

/// Everything is visible; depth is the z coordinate.
struct OpenSky;

impl Viewport for OpenSky {
    fn test_visibility(&self, center: IVec3, _radius: i32) -> Option<i32> {
        Some(center.z)
    }
    fn to_screen(&self, point: IVec3) -> Option<(i16, i16)> {
        Some((point.x as i16, point.y as i16))
    }
    fn draw_line(&mut self, _a: (i16, i16), _b: (i16, i16), _color: u8) {}
    fn draw_static(&mut self, _index: usize) {}
    fn draw_ship(&mut self, _center: IVec3, _rot: [i8; 3], _color: u8) {}
}

fn broadcast(st: &mut MultiplayerState, now: u32) -> Vec<u8> {
    let mut tx = Capture::default();
    st.net_tick(now, &mut tx);
    tx.sent.pop().expect("update was due")
}

#[test]
fn test_two_devices_agree_on_ship_and_shot() {
    // Device A's clock runs 40 seconds ahead of device B's.
    let now_a: u32 = 60_000_000;
    let now_b: u32 = 20_000_000;

    let mut a = MultiplayerState::new();
    a.set_local_ship(I16Vec3::new(100, 200, 300), I8Vec3::new(1, 2, 3), [440, -220, 0]);
    assert!(a.fire_boolet(now_a));
    let token = a.my_boolets.shots()[0].token;
    let payload = broadcast(&mut a, now_a);

    let mut b = MultiplayerState::new();
    b.handle_receive(&MAC_A, &payload, now_b).unwrap();

    let slot = b.directory.find(&MAC_A).expect("peer registered");
    let p = b.directory.get(slot);
    assert_eq!(p.pos, I16Vec3::new(100, 200, 300));
    assert_eq!(p.vel, I8Vec3::new(1, 2, 3));
    assert_eq!(p.rot, [27, -14, 0]);
    // Update times land on the receiver's own clock despite the skew.
    assert_eq!(p.last_update, now_b);

    let shot_a = a.my_boolets.shots()[0];
    let shot_b = b.remote_boolets.slots()[slot * 4];
    assert_eq!(shot_b.token, token);
    // Both devices derive the same world position for the shot at
    // corresponding instants of their own clocks.
    for dt in [0u32, 100_000, 1_000_000, 7_000_000] {
        assert_eq!(
            shot_a.position_at(now_a.wrapping_add(dt)),
            shot_b.position_at(now_b.wrapping_add(dt)),
            "dt {dt}"
        );
    }

    b.build_frame(now_b + 60_000, &OpenSky, &[]);
    assert!(b.queue().iter().any(|e| e.what == RenderRef::Peer(slot)));
    assert!(
        b.queue()
            .iter()
            .any(|e| e.what == RenderRef::RemoteBoolet(slot * 4))
    );
}

#[test]
fn test_shot_kill_is_confirmed_back_to_the_shooter() {
    let now: u32 = 1_000_000;

    let mut a = MultiplayerState::new();
    a.set_local_ship(I16Vec3::new(0, 0, 0), I8Vec3::ZERO, [0, 0, 0]);
    assert!(a.fire_boolet(now));
    let token = a.my_boolets.shots()[0].token;
    let payload_a = broadcast(&mut a, now);

    // B takes the shot head-on and dies to it.
    let mut b = MultiplayerState::new();
    b.tuning.start_health = 10;
    b.respawn();
    b.handle_receive(&MAC_A, &payload_a, now).unwrap();
    let shot = b.remote_boolets.slots()[b.directory.find(&MAC_A).unwrap() * 4];
    let impact_time = now + 150_000;
    let at = shot.position_at(impact_time);
    b.set_local_ship(
        I16Vec3::new(at.x as i16, at.y as i16, at.z as i16),
        I8Vec3::ZERO,
        [0, 0, 0],
    );
    b.build_frame(impact_time, &OpenSky, &[]);
    assert!(b.is_dead());
    assert_eq!(b.killed_by(), token);

    // B's next update carries the corpse; A claims the kill exactly once.
    let payload_b = broadcast(&mut b, impact_time);
    a.handle_receive(&MAC_B, &payload_b, impact_time).unwrap();
    assert_eq!(a.kills(), 1);
    let events: Vec<_> = a.events.drain().collect();
    let slot_b = a.directory.find(&MAC_B).unwrap();
    assert!(events.contains(&MatchEvent::KillConfirmed { peer_slot: slot_b }));

    a.handle_receive(&MAC_B, &payload_b, impact_time + 100_000).unwrap();
    assert_eq!(a.kills(), 1);
}

#[test]
fn test_authoritative_takeover_suppresses_peers() {
    let now: u32 = 5_000_000;

    let mut b = MultiplayerState::new();
    let mut a = MultiplayerState::new();
    a.set_local_ship(I16Vec3::new(7, 7, 7), I8Vec3::ZERO, [0, 0, 0]);
    let peer_payload = broadcast(&mut a, now);
    b.handle_receive(&MAC_A, &peer_payload, now).unwrap();
    assert!(b.directory.find(&MAC_A).is_some());

    // The same framing with the authority magic asserts exclusivity.
    let mut srv = MultiplayerState::new();
    srv.set_local_ship(I16Vec3::new(50, 60, 70), I8Vec3::ZERO, [0, 0, 0]);
    assert!(srv.fire_boolet(now));
    let srv_token = srv.my_boolets.shots()[0].token;
    let mut takeover = broadcast(&mut srv, now);
    takeover[0..4].copy_from_slice(&MAGIC_AUTHORITY.to_le_bytes());

    b.handle_receive(&MAC_SRV, &takeover, now + 10_000).unwrap();
    assert!(b.in_exclusive_mode());
    // The peer table was wiped; only the authority's world view remains.
    assert!(b.directory.find(&MAC_A).is_none());
    assert!(b.directory.get(0).pos == I16Vec3::new(50, 60, 70));
    // In exclusive mode the authority's shots own the pool base.
    assert_eq!(b.remote_boolets.slots()[0].token, srv_token);

    // Ordinary peer updates are ignored for the takeover window.
    let late_peer = broadcast(&mut a, now + 200_000);
    b.handle_receive(&MAC_A, &late_peer, now + 200_000).unwrap();
    assert!(b.directory.find(&MAC_A).is_none());
}

#[test]
fn test_cooperative_authority_layers_after_peer_blocks() {
    let now: u32 = 5_000_000;

    let mut srv = MultiplayerState::new();
    srv.set_local_ship(I16Vec3::new(1, 2, 3), I8Vec3::ZERO, [0, 0, 0]);
    assert!(srv.fire_boolet(now));
    let srv_token = srv.my_boolets.shots()[0].token;
    let mut payload = broadcast(&mut srv, now);
    payload[0..4].copy_from_slice(&MAGIC_AUTHORITY.to_le_bytes());

    // Rebuild the header with the exclusivity bit declined, leaving the
    // body untouched.
    let mut h = BitWriter::new();
    h.write_ue(1); // protocol version
    h.write_ue(0); // models
    h.write_ue(1); // ships
    h.write_ue(1); // boolets
    h.write_ue(0); // reserved
    h.write_ue(0); // text length
    h.write_uq(1, 1); // cooperative, no takeover
    payload[8..12].copy_from_slice(&h.finish().to_le_bytes());

    let mut b = MultiplayerState::new();
    b.handle_receive(&MAC_SRV, &payload, now).unwrap();
    assert!(!b.in_exclusive_mode());
    let base = MAX_PEERS * 4;
    assert_eq!(b.remote_boolets.slots()[base].token, srv_token);
    assert_eq!(b.remote_boolets.slots()[0].token, 0);
}

#[test]
fn test_text_broadcast_reaches_the_other_device() {
    use dogfight::NetText;

    let now: u32 = 2_000_000;
    let mut a = MultiplayerState::new();
    a.set_broadcast_text(Some(NetText::new(92, b"good game")));
    let payload = broadcast(&mut a, now);

    let mut b = MultiplayerState::new();
    b.handle_receive(&MAC_A, &payload, now).unwrap();
    assert_eq!(b.net_text().color(), Some(92));
    assert_eq!(b.net_text().text(), b"good game");
    let events: Vec<_> = b.events.drain().collect();
    assert!(events.contains(&MatchEvent::TextReceived { color: 92 }));
}

#[test]
fn test_stale_peer_drops_out_after_silence() {
    let now: u32 = 1_000_000;
    let mut a = MultiplayerState::new();
    let payload = broadcast(&mut a, now);

    let mut b = MultiplayerState::new();
    b.handle_receive(&MAC_A, &payload, now).unwrap();
    let slot = b.directory.find(&MAC_A).unwrap();

    b.build_frame(now + 9_000_000, &OpenSky, &[]);
    assert!(b.queue().iter().any(|e| e.what == RenderRef::Peer(slot)));

    // 10.1 seconds of silence: gone from the frame, slot reclaimable.
    b.build_frame(now + 10_100_000, &OpenSky, &[]);
    assert!(!b.queue().iter().any(|e| matches!(e.what, RenderRef::Peer(_))));
    assert!(b.directory.get(slot).flags.is_empty());
}

#[test]
fn test_truncated_packets_never_panic_or_corrupt() {
    let now: u32 = 1_000_000;
    let mut a = MultiplayerState::new();
    a.set_local_ship(I16Vec3::new(9, 9, 9), I8Vec3::new(1, 1, 1), [110, 110, 110]);
    let mut t = now;
    for _ in 0..4 {
        assert!(a.fire_boolet(t));
        t += 400_000;
    }
    a.set_broadcast_text(Some(dogfight::NetText::new(3, b"hello there")));
    let payload = broadcast(&mut a, t);

    for cut in 0..=payload.len() {
        let mut b = MultiplayerState::new();
        let _ = b.handle_receive(&MAC_A, &payload[..cut], t);
        // Whatever was applied, a frame can still be built and drawn.
        b.build_frame(t + 50_000, &OpenSky, &[]);
        b.draw_frame(t + 50_000, &mut OpenSky);
    }
}
