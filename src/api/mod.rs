//! Client-facing surfaces. The web tier is stateless: it only remembers
//! which node it currently believes is the leader.

pub mod web;
