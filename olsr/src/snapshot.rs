use std::collections::{BTreeMap, BTreeSet};

use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::concepts::link::{LinkTuple, NeighbourTuple, TwoHopTuple};
use crate::concepts::route::RouteEntry;
use crate::concepts::topology::{
    DuplicateTuple, InterfaceAssociationTuple, MprSelectorTuple, TopologyTuple,
};
use crate::framework::RoutingSystem;
use crate::router::Router;

/// Point in time copy of everything a router knows, for debugging and inspection
#[serde_as]
#[derive(Serialize, Deserialize, Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
#[serde(bound = "")]
pub struct Snapshot<T: RoutingSystem> {
    pub address: T::NodeAddress,
    pub links: Vec<LinkTuple<T>>,
    pub neighbours: Vec<NeighbourTuple<T>>,
    pub two_hops: Vec<TwoHopTuple<T>>,
    pub mpr_selectors: Vec<MprSelectorTuple<T>>,
    pub topology: Vec<TopologyTuple<T>>,
    pub interface_associations: Vec<InterfaceAssociationTuple<T>>,
    pub duplicates: Vec<DuplicateTuple<T>>,
    pub mprs: BTreeSet<T::NodeAddress>,
    pub ansn: u16,
    #[serde_as(as = "Vec<(_, _)>")]
    pub routes: BTreeMap<T::NodeAddress, RouteEntry<T>>,
}

impl<T: RoutingSystem> Snapshot<T> {
    pub fn capture(router: &Router<T>) -> Self {
        let state = &router.state;
        Snapshot {
            address: router.address.clone(),
            links: state.links.iter().cloned().collect(),
            neighbours: state.neighbours.iter().cloned().collect(),
            two_hops: state.two_hops.iter().cloned().collect(),
            mpr_selectors: state.mpr_selectors.iter().cloned().collect(),
            topology: state.topology.iter().cloned().collect(),
            interface_associations: state.interface_associations.iter().cloned().collect(),
            duplicates: state.duplicates.iter().cloned().collect(),
            mprs: state.mprs.clone(),
            ansn: state.ansn,
            routes: router.table.entries().clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl<T: RoutingSystem> Router<T> {
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot::capture(self)
    }
}
