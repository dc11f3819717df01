use crate::framework::RoutingSystem;
use educe::Educe;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct RouteEntry<T: RoutingSystem + ?Sized> {
    pub destination: T::NodeAddress,
    /// interface address of the symmetric neighbour to send through
    pub next_hop: T::NodeAddress,
    /// local interface the neighbour is reached on
    pub interface_address: T::NodeAddress,
    /// number of hops to the destination
    pub distance: u32,
    /// main addresses of the intermediate nodes, excluding both ends
    pub path: Vec<T::NodeAddress>,
}

impl<T: RoutingSystem + ?Sized> RouteEntry<T> {
    /// Whether packets to the destination leave through the same hop as with `other`
    pub fn same_forwarding(&self, other: &RouteEntry<T>) -> bool {
        self.next_hop == other.next_hop
            && self.interface_address == other.interface_address
            && self.distance == other.distance
    }
}

impl<T: RoutingSystem + ?Sized> Display for RouteEntry<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} via {} dev {} dist {}",
            self.destination, self.next_hop, self.interface_address, self.distance
        )
    }
}
