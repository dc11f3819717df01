use crate::framework::RoutingSystem;
use educe::Educe;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A local OLSR interface
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct Interface<T: RoutingSystem + ?Sized> {
    pub id: T::InterfaceId,
    /// address this interface uses as the source of its packets
    pub address: T::NodeAddress,
}

impl<T: RoutingSystem + ?Sized> Interface<T> {
    pub fn new(id: T::InterfaceId, address: T::NodeAddress) -> Self {
        Interface { id, address }
    }
}
