//! Ben-Or style randomized binary consensus: one HTTP-controlled node per
//! participant, exchanging round-tagged votes until correct nodes agree.

pub mod api;
pub mod consensus;
pub mod core;
pub mod fleet;
pub mod network;
