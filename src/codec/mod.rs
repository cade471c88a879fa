//! G.711 A-law transcoding.

pub mod alaw;
