use crate::feedback::InvalidWillingness;
use crate::framework::{RoutingSystem, Time};
use educe::Educe;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How willing a node is to carry traffic on behalf of others, 0..=7
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(try_from = "u8", into = "u8"))]
pub struct Willingness(u8);

impl Willingness {
    pub const NEVER: Willingness = Willingness(0);
    pub const LOW: Willingness = Willingness(1);
    pub const DEFAULT: Willingness = Willingness(3);
    pub const HIGH: Willingness = Willingness(6);
    pub const ALWAYS: Willingness = Willingness(7);

    /// Takes the low three bits of the HELLO willingness field
    pub fn from_bits(bits: u8) -> Self {
        Willingness(bits & 0x07)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Willingness {
    fn default() -> Self {
        Willingness::DEFAULT
    }
}

impl TryFrom<u8> for Willingness {
    type Error = InvalidWillingness;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 7 {
            Ok(Willingness(value))
        } else {
            Err(InvalidWillingness(value))
        }
    }
}

impl From<Willingness> for u8 {
    fn from(value: Willingness) -> Self {
        value.0
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeighbourStatus {
    Symmetric,
    NotSymmetric,
}

/// RFC 3626, Section 4.2.1. Link Set
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct LinkTuple<T: RoutingSystem + ?Sized> {
    pub local_iface_addr: T::NodeAddress,
    pub neighbour_iface_addr: T::NodeAddress,
    /// the link is symmetric until this time
    pub sym_time: Time,
    /// the neighbour interface is heard until this time
    pub asym_time: Time,
    /// the tuple is removed at this time
    pub time: Time,
    /// set by link layer feedback, the link is considered lost until this time
    pub lost_time: Option<Time>,
}

impl<T: RoutingSystem + ?Sized> LinkTuple<T> {
    pub fn is_symmetric(&self, now: Time) -> bool {
        self.sym_time > now
    }

    pub fn is_asymmetric(&self, now: Time) -> bool {
        self.asym_time > now
    }

    pub fn is_lost(&self, now: Time) -> bool {
        self.lost_time.is_some_and(|lost| lost > now)
    }

    pub fn is_alive(&self, now: Time) -> bool {
        self.time > now
    }
}

/// RFC 3626, Section 4.3.1. Neighbor Set
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct NeighbourTuple<T: RoutingSystem + ?Sized> {
    pub main_address: T::NodeAddress,
    pub willingness: Willingness,
    pub status: NeighbourStatus,
}

impl<T: RoutingSystem + ?Sized> NeighbourTuple<T> {
    pub fn is_symmetric(&self) -> bool {
        self.status == NeighbourStatus::Symmetric
    }
}

/// RFC 3626, Section 4.3.2. 2-hop Neighbor Set
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct TwoHopTuple<T: RoutingSystem + ?Sized> {
    pub neighbour_main_address: T::NodeAddress,
    pub two_hop_address: T::NodeAddress,
    pub time: Time,
}
