use educe::Educe;
use thiserror::Error;
use crate::framework::RoutingSystem;

/// Reasons for rejecting a datagram as an OLSR packet. The router drops the whole packet when any of these occur.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error("datagram of {0} bytes is shorter than the packet header")]
    ShortPacket(usize),
    #[error("packet length field says {declared} bytes, datagram holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("packet carries no messages")]
    Empty,
    #[error("message size {0} is shorter than the message header")]
    ShortMessage(usize),
    #[error("message size {size} overruns the {remaining} bytes left in the packet")]
    MessageOverrun { size: usize, remaining: usize },
    #[error("malformed {0} message body")]
    MalformedBody(&'static str),
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
#[error("willingness {0} is outside of 0..=7")]
pub struct InvalidWillingness(pub u8);

#[derive(Error)]
#[derive(Educe)]
#[educe(Debug(bound()))]
pub enum RoutingError<T: RoutingSystem + ?Sized> {
    /// The host handed over a packet for an interface the router was never told about
    #[error("packet arrived on unknown interface {id:?}")]
    UnknownInterface {
        id: T::InterfaceId
    },
    #[error("dropped malformed packet: {0}")]
    Malformed(#[from] DecodeError),
}
