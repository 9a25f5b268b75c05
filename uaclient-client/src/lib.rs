//! Client side connection establishment for OPC UA over the binary TCP
//! transport. The [`Client`] drives a connection from disconnected to an
//! active authenticated session through three layered handshakes:
//!
//! 1. The transport HELLO / ACKNOWLEDGE exchange, negotiating buffer sizes.
//! 2. OpenSecureChannel, an asymmetrically protected key exchange.
//! 3. CreateSession / ActivateSession, the application level session.
//!
//! In between, the client can discover the server's endpoints and pick one
//! compatible with its configuration, reconnecting once if the security
//! policy changed. An established channel is renewed in the background
//! whenever its token approaches expiry.

mod builder;
mod config;
mod session;
pub mod transport;

pub use builder::ClientBuilder;
pub use config::{ClientConfig, IdentityToken, TransportLimits};
pub use session::{
    Client, ClientState, PollResult, SessionInfo, StateCallback,
};
pub use transport::{AsyncSecureChannel, Connector, SecureChannelEventLoop, TransportPollResult};
