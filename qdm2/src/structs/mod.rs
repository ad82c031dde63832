//! Data structures representing format components.
//!
//! Contains the stream configuration read from extradata, the typed view of
//! sub-packets, and the tone, noise and channel state carried from frame to
//! frame during decoding.

pub mod channel;
pub mod config;
pub mod noise;
pub mod sub_packet;
pub mod tone;
