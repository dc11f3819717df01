use crate::framework::{RoutingSystem, Time};
use educe::Educe;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A neighbour that selected this node as one of its MPRs
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct MprSelectorTuple<T: RoutingSystem + ?Sized> {
    pub main_address: T::NodeAddress,
    pub time: Time,
}

/// `last_address` advertised `dest_address` as one of its MPR selectors
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct TopologyTuple<T: RoutingSystem + ?Sized> {
    pub dest_address: T::NodeAddress,
    pub last_address: T::NodeAddress,
    /// ANSN of the TC this tuple came from
    pub seqno: u16,
    pub time: Time,
}

/// Maps an interface address onto the main address of the node that owns it
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct InterfaceAssociationTuple<T: RoutingSystem + ?Sized> {
    pub iface_address: T::NodeAddress,
    pub main_address: T::NodeAddress,
    /// `None` for the permanent associations of local interfaces
    pub time: Option<Time>,
}

/// A message that was already processed, keyed by originator and message sequence number
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct DuplicateTuple<T: RoutingSystem + ?Sized> {
    pub originator: T::NodeAddress,
    pub seqno: u16,
    pub retransmitted: bool,
    /// local interfaces the message was received on
    pub interfaces: Vec<T::NodeAddress>,
    pub time: Time,
}
