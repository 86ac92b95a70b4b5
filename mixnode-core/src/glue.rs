//! Seams between the decoy subsystem and the rest of the node.

use crate::packet::OutboundPacket;
use tokio::sync::mpsc;

/// Outbound packet sink. Fire-and-forget: the decoy never learns whether the
/// packet made it onto the wire.
pub trait Connector: Send + Sync {
    fn dispatch_packet(&self, pkt: OutboundPacket);
}

impl Connector for mpsc::UnboundedSender<OutboundPacket> {
    fn dispatch_packet(&self, pkt: OutboundPacket) {
        if let Err(e) = self.send(pkt) {
            log::debug!("Connector closed, dropping packet {}", e.0.id);
        }
    }
}
