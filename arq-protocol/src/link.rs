//! Link and application boundaries
//!
//! The protocol never owns its link or its application. Both are handed to
//! each entry point by mutable reference, so a driver can route packets
//! between endpoints without shared ownership.

use bytes::Bytes;

/// Outbound half of a packet link
///
/// Delivery in the other direction happens by the driver calling
/// `Sender::on_ack` or `Receiver::on_packet` with the bytes that arrived.
pub trait Link {
    /// Hand a packet to the link. The link may drop, delay, reorder or corrupt it.
    fn send_packet(&mut self, packet: Bytes);
}

/// Consumer of the in-order byte stream
pub trait Application {
    /// Called once per delivered fragment payload, in sequence order.
    ///
    /// The return value is currently ignored by the receiver.
    fn on_data(&mut self, data: Bytes) -> bool;
}

impl Link for Vec<Bytes> {
    fn send_packet(&mut self, packet: Bytes) {
        self.push(packet);
    }
}

impl Application for Vec<Bytes> {
    fn on_data(&mut self, data: Bytes) -> bool {
        self.push(data);
        true
    }
}

impl<L: Link + ?Sized> Link for &mut L {
    fn send_packet(&mut self, packet: Bytes) {
        (**self).send_packet(packet);
    }
}

impl<A: Application + ?Sized> Application for &mut A {
    fn on_data(&mut self, data: Bytes) -> bool {
        (**self).on_data(data)
    }
}
