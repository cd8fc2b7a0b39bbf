//! ARQ Protocol Core Implementation
//!
//! This crate implements a selective-repeat reliable byte stream over an
//! unreliable packet link: the fragment/acknowledgment codec, the sequence id
//! pool, and the sender and receiver state machines. The link and the
//! application are supplied by the caller at every entry point.

pub mod config;
pub mod link;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod sequence;

pub use config::{ConfigError, ProtocolConfig};
pub use link::{Application, Link};
pub use packet::{Fragment, PacketError, ACK_SIZE, DEFAULT_MTU, HEADER_SIZE};
pub use receiver::{Receipt, Receiver, ReceiverStats};
pub use sender::{SendError, Sender, SenderStats};
pub use sequence::{SeqPool, SequenceError, MAX_POOL_SIZE, POOL_SIZE};
