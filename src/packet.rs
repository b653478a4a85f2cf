//! Broadcast update encode/decode.
//!
//! Every packet is self-contained: a fixed 12-byte header (magic, sender
//! timestamp, bit-packed section counts), then the sections in order:
//! network models, ships, boolets, text. Packets are never fragmented,
//! acknowledged, or retransmitted; a lost update is simply superseded by
//! the next one.

use glam::{I8Vec3, I16Vec3};
use thiserror::Error;

use crate::boolet::{Boolet, RemoteBoolets, SenderClass};
use crate::clock::PeerClock;
use crate::codec::{BitReader, BitWriter, ByteReader, CodecError};
use crate::event::MatchEvent;
use crate::netmodel::bone_count;
use crate::peer::{MAX_PEERS, Mac, PeerFlags};
use crate::state::{MultiplayerState, NetText};

/// Framing for ordinary peer-to-peer updates ("fSFf").
pub const MAGIC_PEER: u32 = 0x6653_4653;
/// Framing for an authoritative sender's updates ("sSFs").
pub const MAGIC_AUTHORITY: u32 = 0x7353_4653;
pub const PROTOCOL_VERSION: u32 = 1;
/// Magic + timestamp + bit-packed section counts.
pub const HEADER_LEN: usize = 12;
/// Broadcast text cap, color byte included.
pub const NET_TEXT_CAP: usize = 24;
/// Everything must fit one unfragmented frame on the radio link.
pub const MAX_PACKET_SIZE: usize = 250;

const SHIP_RECORD_LEN: usize = 17;
const BOOLET_RECORD_LEN: usize = 17;
const MODEL_BODY_LEN: usize = 11;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error(transparent)]
    Truncated(#[from] CodecError),
    #[error("unsupported protocol version {0}")]
    Version(u32),
}

/// The local plane's fields as they go on the wire, quantized by the
/// caller.
#[derive(Debug, Clone, Copy)]
pub struct ShipUpdate {
    pub pos: I16Vec3,
    pub vel: I8Vec3,
    /// Heading/pitch/roll, reduced to 8 bits per axis.
    pub rot: [i8; 3],
    pub dead: bool,
    /// Token of the shot that killed us, while dead.
    pub killed_by: u16,
    pub color_hint: u8,
}

/// Append one complete peer update to `out`: header, our ship, every
/// in-flight shot, and optional broadcast text.
pub fn encode_update(
    out: &mut Vec<u8>,
    now: u32,
    ship: &ShipUpdate,
    shots: &[Boolet],
    text: Option<&NetText>,
) {
    let text_raw = text.map(NetText::raw).filter(|r| !r.is_empty());
    let live = shots.iter().filter(|b| b.is_live()).count() as u32;

    out.extend_from_slice(&MAGIC_PEER.to_le_bytes());
    out.extend_from_slice(&now.to_le_bytes());

    let mut h = BitWriter::new();
    h.write_ue(PROTOCOL_VERSION);
    h.write_ue(0); // we never originate network models
    h.write_ue(1);
    h.write_ue(live);
    h.write_ue(0); // reserved
    h.write_ue(text_raw.map_or(0, |r| r.len() as u32));
    out.extend_from_slice(&h.finish().to_le_bytes());

    // Ship section. Our ship is always local index 0.
    out.push(0);
    for c in [ship.pos.x, ship.pos.y, ship.pos.z] {
        out.extend_from_slice(&c.to_le_bytes());
    }
    out.extend_from_slice(&[ship.vel.x as u8, ship.vel.y as u8, ship.vel.z as u8]);
    out.extend_from_slice(&[ship.rot[0] as u8, ship.rot[1] as u8, ship.rot[2] as u8]);
    let mut flags = PeerFlags::PRESENT;
    if ship.dead {
        flags |= PeerFlags::DEAD;
    }
    out.push(flags.bits());
    out.extend_from_slice(&ship.killed_by.to_le_bytes());
    out.push(ship.color_hint);

    for (i, b) in shots.iter().enumerate() {
        if !b.is_live() {
            continue;
        }
        out.push(i as u8);
        out.extend_from_slice(&b.launch_time.to_le_bytes());
        for c in [b.launch_pos.x, b.launch_pos.y, b.launch_pos.z] {
            out.extend_from_slice(&c.to_le_bytes());
        }
        for c in b.launch_rot {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out.extend_from_slice(&b.token.to_le_bytes());
    }

    if let Some(raw) = text_raw {
        out.extend_from_slice(raw);
    }
    debug_assert!(out.len() <= MAX_PACKET_SIZE);
}

/// Apply one inbound packet to the shared state. Unknown framing and
/// directory overflow drop the packet silently; a short buffer aborts
/// parsing where it stands, keeping whatever sections already applied.
pub(crate) fn decode_update(
    st: &mut MultiplayerState,
    mac: &Mac,
    data: &[u8],
    now: u32,
) -> Result<(), PacketError> {
    let mut r = ByteReader::new(data);
    let magic = r.read_u32()?;
    let sender = match magic {
        MAGIC_AUTHORITY => SenderClass::Authority,
        MAGIC_PEER if st.exclusive_frames == 0 => SenderClass::Peer,
        MAGIC_PEER => {
            log::debug!("peer update ignored while an authoritative sender holds the session");
            return Ok(());
        }
        other => {
            log::debug!("ignoring packet with unknown magic {other:#010x}");
            return Ok(());
        }
    };
    let remote_time = r.read_u32()?;
    let header = r.read_u32()?;

    // Resolve the sender to a directory record and train its clock.
    let peer_slot = match sender {
        SenderClass::Peer => {
            let Some((slot, inserted)) = st.directory.lookup_or_insert(mac) else {
                log::debug!("peer directory full, dropping update from {mac:02x?}");
                return Ok(());
            };
            let p = st.directory.get_mut(slot);
            if inserted {
                p.clock = PeerClock::from_first_sample(remote_time, now);
            }
            p.clock.sample(remote_time, now);
            slot
        }
        SenderClass::Authority => {
            let p = &mut st.directory.authority;
            if !p.flags.contains(PeerFlags::PRESENT) {
                p.clock = PeerClock::from_first_sample(remote_time, now);
                p.flags |= PeerFlags::PRESENT;
            }
            p.clock.sample(remote_time, now);
            0
        }
    };
    let clock = match sender {
        SenderClass::Peer => st.directory.get(peer_slot).clock,
        SenderClass::Authority => st.directory.authority.clock,
    };
    let send_time_local = clock.remote_to_local(remote_time);

    let mut bits = BitReader::new(header);
    let version = bits.read_ue();
    if version != PROTOCOL_VERSION {
        return Err(PacketError::Version(version));
    }
    let model_count = bits.read_ue();
    let ship_count = bits.read_ue();
    let boolet_count = bits.read_ue();
    bits.read_ue(); // reserved, written as zero and never interpreted
    let text_len = bits.read_ue();

    if sender == SenderClass::Authority && bits.read_uq(1) == 0 {
        // Exclusive takeover: ordinary peers are suppressed and their
        // stale world view wiped, so only the authority's state remains.
        if st.exclusive_frames == 0 {
            st.directory.clear();
        }
        st.exclusive_frames = st.tuning.exclusive_frames;
    }
    let exclusive = st.exclusive_frames > 0;

    for _ in 0..model_count {
        let codeword = r.read_u32()?;
        let bones = bone_count(codeword);
        let mut body = ByteReader::new(r.take(MODEL_BODY_LEN + 3 * bones)?);
        let id = codeword & 0xFF;
        let (_, m) = st.net_models.prepare(id, codeword);
        m.last_update = send_time_local;
        m.root = I16Vec3::new(body.read_i16()?, body.read_i16()?, body.read_i16()?);
        m.radius = body.read_u8()?;
        m.color = body.read_u8()?;
        m.vel = I8Vec3::new(body.read_i8()?, body.read_i8()?, body.read_i8()?);
        for bone in m.bones.iter_mut() {
            *bone = I8Vec3::new(body.read_i8()?, body.read_i8()?, body.read_i8()?);
        }
    }

    for _ in 0..ship_count {
        let mut rec = ByteReader::new(r.take(SHIP_RECORD_LEN)?);
        let wire_id = rec.read_u8()?;
        // A peer speaks only for itself; only the authority may address
        // arbitrary directory slots.
        let slot = match sender {
            SenderClass::Peer => peer_slot,
            SenderClass::Authority => {
                let s = wire_id as usize;
                if s < MAX_PEERS { s } else { 0 }
            }
        };
        let p = st.directory.get_mut(slot);
        p.last_update = send_time_local;
        p.pos = I16Vec3::new(rec.read_i16()?, rec.read_i16()?, rec.read_i16()?);
        p.vel = I8Vec3::new(rec.read_i8()?, rec.read_i8()?, rec.read_i8()?);
        p.rot = [rec.read_i8()?, rec.read_i8()?, rec.read_i8()?];
        p.flags = PeerFlags::from_bits_truncate(rec.read_u8()?) | PeerFlags::PRESENT;
        p.aux_flags = rec.read_u16()?;
        p.color = rec.read_u8()?;

        if p.flags.contains(PeerFlags::DEAD) {
            if p.frames_dead == 0 {
                // Freshly dead: if the fatal token is one of ours, that
                // kill belongs to us.
                if st.my_boolets.owns_token(p.aux_flags) {
                    st.kills += 1;
                    st.events.push(MatchEvent::KillConfirmed { peer_slot: slot });
                }
                p.frames_dead = 1;
            }
        } else {
            p.frames_dead = 0;
        }
    }

    for _ in 0..boolet_count {
        let mut rec = ByteReader::new(r.take(BOOLET_RECORD_LEN)?);
        let local_index = rec.read_u8()?;
        let slot = RemoteBoolets::slot_for(sender, peer_slot, local_index, exclusive);
        let b = st.remote_boolets.get_mut(slot);
        b.launch_time = clock.remote_to_local(rec.read_u32()?);
        b.launch_pos = I16Vec3::new(rec.read_i16()?, rec.read_i16()?, rec.read_i16()?);
        b.launch_rot = [rec.read_i16()?, rec.read_i16()?];
        b.token = rec.read_u16()?;
    }

    let text_len = text_len as usize;
    if text_len > 0 && text_len < NET_TEXT_CAP && r.remaining() >= text_len {
        let bytes = r.take(text_len)?;
        st.net_text.set_raw(bytes);
        st.events.push(MatchEvent::TextReceived { color: bytes[0] });
    }

    Ok(())
}
