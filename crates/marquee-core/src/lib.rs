//! Conversation core for marquee: sessions, intent routing, library
//! reconciliation and request gating.

pub mod classify;
pub mod config;
pub mod enrichment;
pub mod intent;
pub mod media;
pub mod notify;
pub mod quota;
pub mod router;
pub mod services;
pub mod session;
pub mod users;
