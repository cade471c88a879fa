//! RTP packet parsing/construction, ingress demultiplexing, and paced
//! egress.

pub mod demux;
pub mod packet;
pub mod sender;

pub use packet::RtpPacket;
