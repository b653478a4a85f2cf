pub mod boolet;
pub mod clock;
pub mod codec;
pub mod event;
pub mod netmodel;
pub mod packet;
pub mod peer;
pub mod render;
pub mod state;

pub use boolet::{
    BOOLET_MAX_AGE_US, BOOLETS_PER_PLAYER, Boolet, MAX_BOOLETS, RemoteBoolets, SelfBoolets,
    SenderClass,
};
pub use clock::PeerClock;
pub use codec::{BitReader, BitWriter, ByteReader, CodecError};
pub use event::{MatchEvent, MatchEvents};
pub use netmodel::{MAX_BONES, MAX_NETWORK_MODELS, NetworkModel, NetworkModelPool};
pub use packet::{
    HEADER_LEN, MAGIC_AUTHORITY, MAGIC_PEER, MAX_PACKET_SIZE, NET_TEXT_CAP, PROTOCOL_VERSION,
    PacketError, ShipUpdate,
};
pub use peer::{MAX_PEERS, Mac, Peer, PeerDirectory, PeerFlags};
pub use render::{RenderEntry, RenderQueue, RenderRef, StaticBounds, Viewport};
pub use state::{LocalShip, MultiplayerState, NetText, Transport, Tuning};
