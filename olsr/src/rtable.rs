use std::collections::{BTreeMap, BTreeSet};

use crate::concepts::link::Willingness;
use crate::concepts::route::RouteEntry;
use crate::framework::{RoutingSystem, Time};
use crate::state::State;

/// Shortest hop-count routes to every known destination, keyed by destination address
pub struct RoutingTable<T: RoutingSystem> {
    entries: BTreeMap<T::NodeAddress, RouteEntry<T>>,
}

impl<T: RoutingSystem> RoutingTable<T> {
    pub fn new() -> Self {
        RoutingTable {
            entries: BTreeMap::new(),
        }
    }

    pub fn lookup(&self, destination: &T::NodeAddress) -> Option<&RouteEntry<T>> {
        self.entries.get(destination)
    }

    /// Intermediate hops followed by the destination itself
    pub fn path_to(&self, destination: &T::NodeAddress) -> Option<Vec<T::NodeAddress>> {
        let route = self.lookup(destination)?;
        let mut path = route.path.clone();
        path.push(route.destination.clone());
        Some(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry<T>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<T::NodeAddress, RouteEntry<T>> {
        &self.entries
    }

    fn add(&mut self, entry: RouteEntry<T>) {
        self.entries.insert(entry.destination.clone(), entry);
    }

    /// Builds the table from scratch (RFC 3626, Section 10)
    pub fn compute(state: &State<T>, locals: &BTreeSet<T::NodeAddress>, now: Time) -> Self {
        let mut table = RoutingTable::new();

        for neighbour in state.neighbours.iter().filter(|nb| nb.is_symmetric()) {
            let mut main_listed = false;
            let mut last = None;
            for link in state.links.iter().filter(|link| {
                link.is_alive(now) && state.main_address_of(&link.neighbour_iface_addr) == neighbour.main_address
            }) {
                table.add(RouteEntry {
                    destination: link.neighbour_iface_addr.clone(),
                    next_hop: link.neighbour_iface_addr.clone(),
                    interface_address: link.local_iface_addr.clone(),
                    distance: 1,
                    path: Vec::new(),
                });
                main_listed |= link.neighbour_iface_addr == neighbour.main_address;
                last = Some(link);
            }
            if let (false, Some(link)) = (main_listed, last) {
                table.add(RouteEntry {
                    destination: neighbour.main_address.clone(),
                    next_hop: link.neighbour_iface_addr.clone(),
                    interface_address: link.local_iface_addr.clone(),
                    distance: 1,
                    path: Vec::new(),
                });
            }
        }

        for two_hop in state.two_hops.iter() {
            let dest = &two_hop.two_hop_address;
            if locals.contains(dest) {
                continue;
            }
            let Some(relay) = state
                .neighbours
                .find(&two_hop.neighbour_main_address)
                .filter(|nb| nb.is_symmetric() && nb.willingness != Willingness::NEVER)
            else {
                continue;
            };
            if state.neighbours.find(dest).is_some_and(|nb| nb.is_symmetric()) {
                continue;
            }
            let Some(via) = table.lookup(&relay.main_address).cloned() else {
                continue;
            };
            if let Some(existing) = table.lookup(dest) {
                if existing.distance < 2 {
                    continue;
                }
                // a strictly more willing relay keeps its route, otherwise the later relay takes over
                let current = state.neighbours.find(&state.main_address_of(&existing.next_hop));
                if current.is_some_and(|nb| nb.willingness > relay.willingness) {
                    continue;
                }
            }
            table.add(RouteEntry {
                destination: dest.clone(),
                next_hop: via.next_hop,
                interface_address: via.interface_address,
                distance: 2,
                path: vec![relay.main_address.clone()],
            });
        }

        let mut h = 2;
        loop {
            let mut added = false;
            for topology in state.topology.iter() {
                let dest = &topology.dest_address;
                if locals.contains(dest) || table.lookup(dest).is_some() {
                    continue;
                }
                let Some(parent) = table
                    .lookup(&topology.last_address)
                    .filter(|parent| parent.distance == h)
                    .cloned()
                else {
                    continue;
                };
                let mut path = parent.path;
                path.push(parent.destination);
                table.add(RouteEntry {
                    destination: dest.clone(),
                    next_hop: parent.next_hop,
                    interface_address: parent.interface_address,
                    distance: h + 1,
                    path,
                });
                added = true;
            }

            for association in state.interface_associations.iter() {
                let alias = &association.iface_address;
                if locals.contains(alias) || table.lookup(alias).is_some() {
                    continue;
                }
                let Some(main) = table.lookup(&association.main_address).cloned() else {
                    continue;
                };
                table.add(RouteEntry {
                    destination: alias.clone(),
                    ..main
                });
                added = true;
            }

            if !added {
                break;
            }
            h += 1;
        }
        table
    }
}

impl<T: RoutingSystem> Default for RoutingTable<T> {
    fn default() -> Self {
        RoutingTable::new()
    }
}
