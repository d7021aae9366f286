//! Transport-independent building blocks of the call bridge: audio
//! conversion, framing, pacing, format negotiation, upstream provisioning
//! and the pending-token registry.

pub mod chunker;
pub mod codec;
pub mod format;
pub mod pacer;
pub mod provision;
pub mod registry;
pub mod tone;
pub mod transcode;
pub mod webhook;
