use std::collections::{BTreeMap, BTreeSet};

use crate::concepts::link::{LinkTuple, NeighbourTuple, TwoHopTuple};
use crate::concepts::topology::{
    DuplicateTuple, InterfaceAssociationTuple, MprSelectorTuple, TopologyTuple,
};
use crate::framework::{RoutingSystem, Time, TimerService};
use crate::timer::{TimerBook, TupleKey};
use crate::util::{increment, MAX_SEQ_NUM};

/// Set of tuples, unique by their natural key
pub struct Table<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord + Clone, V> Table<K, V> {
    pub fn find(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub fn matching<'a>(&'a self, predicate: impl Fn(&V) -> bool + 'a) -> impl Iterator<Item = &'a V> + 'a {
        self.entries.values().filter(move |v| predicate(v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn put(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub(crate) fn take(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    fn keys_matching(&self, predicate: impl Fn(&V) -> bool) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, v)| predicate(v))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Table {
            entries: BTreeMap::new(),
        }
    }
}

/// A tuple stored in one of the tables of [`State`]
pub trait Tuple<T: RoutingSystem>: Sized {
    type Key: Ord + Clone;
    fn key(&self) -> Self::Key;
    fn table(state: &State<T>) -> &Table<Self::Key, Self>;
    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self>;
}

/// A tuple with a validity time, owning an expiry timer while it is stored
pub trait Timed<T: RoutingSystem>: Tuple<T> {
    fn timer_key(key: &Self::Key) -> TupleKey<T>;
    fn expired(&self, now: Time) -> bool;
    /// When the tuple next needs to be looked at, `None` if never
    fn deadline(&self, now: Time) -> Option<Time>;
    /// Called after a tuple of this kind was added or removed
    fn changed(_state: &mut State<T>) {}
}

/// Outcome of a fired expiry timer
pub enum Expiry<V> {
    /// The tuple was removed
    Expired(V),
    /// The tuple was refreshed in the meantime and the timer re-armed
    Pending,
    /// The timer was superseded, or the tuple is gone
    Stale,
}

/// The information repositories of RFC 3626, Section 4
pub struct State<T: RoutingSystem> {
    pub links: Table<(T::NodeAddress, T::NodeAddress), LinkTuple<T>>,
    pub neighbours: Table<T::NodeAddress, NeighbourTuple<T>>,
    pub two_hops: Table<(T::NodeAddress, T::NodeAddress), TwoHopTuple<T>>,
    pub mpr_selectors: Table<T::NodeAddress, MprSelectorTuple<T>>,
    pub topology: Table<(T::NodeAddress, T::NodeAddress), TopologyTuple<T>>,
    pub interface_associations: Table<T::NodeAddress, InterfaceAssociationTuple<T>>,
    pub duplicates: Table<(T::NodeAddress, u16), DuplicateTuple<T>>,
    /// main addresses of the neighbours selected as MPRs
    pub mprs: BTreeSet<T::NodeAddress>,
    /// advertised neighbour sequence number, bumped on every MPR selector set change
    pub ansn: u16,
    timers: TimerBook<T>,
}

impl<T: RoutingSystem> State<T> {
    pub fn new() -> Self {
        State {
            links: Table::default(),
            neighbours: Table::default(),
            two_hops: Table::default(),
            mpr_selectors: Table::default(),
            topology: Table::default(),
            interface_associations: Table::default(),
            duplicates: Table::default(),
            mprs: BTreeSet::new(),
            ansn: MAX_SEQ_NUM,
            timers: TimerBook::new(),
        }
    }

    /// Looks up the main address of the node owning `address`, an unknown interface is its own main address
    pub fn main_address_of(&self, address: &T::NodeAddress) -> T::NodeAddress {
        self.interface_associations
            .find(address)
            .map(|association| association.main_address.clone())
            .unwrap_or_else(|| address.clone())
    }

    /// Stores a tuple, replacing the one with the same key, and arms its expiry timer
    pub fn insert<V: Timed<T>>(&mut self, tuple: V, now: Time, timers: &mut dyn TimerService<T>) {
        let key = tuple.key();
        match tuple.deadline(now) {
            Some(at) => self
                .timers
                .arm(V::timer_key(&key), at.saturating_sub(now), timers),
            None => self.timers.disarm(&V::timer_key(&key), timers),
        }
        V::table_mut(self).put(key, tuple);
        V::changed(self);
    }

    /// Removes a tuple and cancels its timer
    pub fn erase<V: Timed<T>>(&mut self, key: &V::Key, timers: &mut dyn TimerService<T>) -> Option<V> {
        let removed = V::table_mut(self).take(key)?;
        self.timers.disarm(&V::timer_key(key), timers);
        V::changed(self);
        Some(removed)
    }

    pub fn erase_matching<V: Timed<T>>(
        &mut self,
        predicate: impl Fn(&V) -> bool,
        timers: &mut dyn TimerService<T>,
    ) -> Vec<V> {
        let keys = V::table(self).keys_matching(predicate);
        keys.iter()
            .filter_map(|key| self.erase::<V>(key, timers))
            .collect()
    }

    /// Re-arms the timer of a tuple that was modified in place
    pub fn rearm<V: Timed<T>>(&mut self, key: &V::Key, now: Time, timers: &mut dyn TimerService<T>) {
        let Some(deadline) = V::table(self).find(key).and_then(|tuple| tuple.deadline(now)) else {
            return;
        };
        self.timers
            .arm(V::timer_key(key), deadline.saturating_sub(now), timers);
    }

    /// Handles a fired expiry timer. Tuples refreshed since the timer was armed are re-armed
    /// at their new deadline instead of removed.
    pub fn expire<V: Timed<T>>(
        &mut self,
        key: &V::Key,
        generation: u64,
        now: Time,
        timers: &mut dyn TimerService<T>,
    ) -> Expiry<V> {
        if !self.timers.fire(&V::timer_key(key), generation) {
            return Expiry::Stale;
        }
        let Some((expired, deadline)) = V::table(self)
            .find(key)
            .map(|tuple| (tuple.expired(now), tuple.deadline(now)))
        else {
            return Expiry::Stale;
        };
        if expired {
            let Some(tuple) = V::table_mut(self).take(key) else {
                return Expiry::Stale;
            };
            V::changed(self);
            return Expiry::Expired(tuple);
        }
        if let Some(at) = deadline {
            self.timers
                .arm(V::timer_key(key), at.saturating_sub(now), timers);
        }
        Expiry::Pending
    }

    pub fn has_timer<V: Timed<T>>(&self, key: &V::Key) -> bool {
        self.timers.is_armed(&V::timer_key(key))
    }

    /// Drops every tuple and cancels all timers
    pub fn clear(&mut self, timers: &mut dyn TimerService<T>) {
        self.timers.clear(timers);
        let ansn = self.ansn;
        *self = State::new();
        self.ansn = ansn;
    }
}

impl<T: RoutingSystem> Default for State<T> {
    fn default() -> Self {
        State::new()
    }
}

impl<T: RoutingSystem> Tuple<T> for LinkTuple<T> {
    type Key = (T::NodeAddress, T::NodeAddress);

    fn key(&self) -> Self::Key {
        (self.local_iface_addr.clone(), self.neighbour_iface_addr.clone())
    }

    fn table(state: &State<T>) -> &Table<Self::Key, Self> {
        &state.links
    }

    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self> {
        &mut state.links
    }
}

impl<T: RoutingSystem> Timed<T> for LinkTuple<T> {
    fn timer_key((local, neighbour): &Self::Key) -> TupleKey<T> {
        TupleKey::Link {
            local: local.clone(),
            neighbour: neighbour.clone(),
        }
    }

    fn expired(&self, now: Time) -> bool {
        self.time <= now
    }

    /// The link also needs attention when it stops being symmetric, so that the neighbour loss is handled
    fn deadline(&self, now: Time) -> Option<Time> {
        if self.is_symmetric(now) {
            Some(self.time.min(self.sym_time))
        } else {
            Some(self.time)
        }
    }
}

impl<T: RoutingSystem> Tuple<T> for NeighbourTuple<T> {
    type Key = T::NodeAddress;

    fn key(&self) -> Self::Key {
        self.main_address.clone()
    }

    fn table(state: &State<T>) -> &Table<Self::Key, Self> {
        &state.neighbours
    }

    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self> {
        &mut state.neighbours
    }
}

impl<T: RoutingSystem> Tuple<T> for TwoHopTuple<T> {
    type Key = (T::NodeAddress, T::NodeAddress);

    fn key(&self) -> Self::Key {
        (self.neighbour_main_address.clone(), self.two_hop_address.clone())
    }

    fn table(state: &State<T>) -> &Table<Self::Key, Self> {
        &state.two_hops
    }

    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self> {
        &mut state.two_hops
    }
}

impl<T: RoutingSystem> Timed<T> for TwoHopTuple<T> {
    fn timer_key((neighbour, two_hop): &Self::Key) -> TupleKey<T> {
        TupleKey::TwoHop {
            neighbour: neighbour.clone(),
            two_hop: two_hop.clone(),
        }
    }

    fn expired(&self, now: Time) -> bool {
        self.time <= now
    }

    fn deadline(&self, _now: Time) -> Option<Time> {
        Some(self.time)
    }
}

impl<T: RoutingSystem> Tuple<T> for MprSelectorTuple<T> {
    type Key = T::NodeAddress;

    fn key(&self) -> Self::Key {
        self.main_address.clone()
    }

    fn table(state: &State<T>) -> &Table<Self::Key, Self> {
        &state.mpr_selectors
    }

    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self> {
        &mut state.mpr_selectors
    }
}

impl<T: RoutingSystem> Timed<T> for MprSelectorTuple<T> {
    fn timer_key(key: &Self::Key) -> TupleKey<T> {
        TupleKey::MprSelector(key.clone())
    }

    fn expired(&self, now: Time) -> bool {
        self.time <= now
    }

    fn deadline(&self, _now: Time) -> Option<Time> {
        Some(self.time)
    }

    fn changed(state: &mut State<T>) {
        increment(&mut state.ansn);
    }
}

impl<T: RoutingSystem> Tuple<T> for TopologyTuple<T> {
    type Key = (T::NodeAddress, T::NodeAddress);

    fn key(&self) -> Self::Key {
        (self.dest_address.clone(), self.last_address.clone())
    }

    fn table(state: &State<T>) -> &Table<Self::Key, Self> {
        &state.topology
    }

    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self> {
        &mut state.topology
    }
}

impl<T: RoutingSystem> Timed<T> for TopologyTuple<T> {
    fn timer_key((dest, last): &Self::Key) -> TupleKey<T> {
        TupleKey::Topology {
            dest: dest.clone(),
            last: last.clone(),
        }
    }

    fn expired(&self, now: Time) -> bool {
        self.time <= now
    }

    fn deadline(&self, _now: Time) -> Option<Time> {
        Some(self.time)
    }
}

impl<T: RoutingSystem> Tuple<T> for InterfaceAssociationTuple<T> {
    type Key = T::NodeAddress;

    fn key(&self) -> Self::Key {
        self.iface_address.clone()
    }

    fn table(state: &State<T>) -> &Table<Self::Key, Self> {
        &state.interface_associations
    }

    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self> {
        &mut state.interface_associations
    }
}

impl<T: RoutingSystem> Timed<T> for InterfaceAssociationTuple<T> {
    fn timer_key(key: &Self::Key) -> TupleKey<T> {
        TupleKey::InterfaceAssociation(key.clone())
    }

    fn expired(&self, now: Time) -> bool {
        self.time.is_some_and(|time| time <= now)
    }

    fn deadline(&self, _now: Time) -> Option<Time> {
        self.time
    }
}

impl<T: RoutingSystem> Tuple<T> for DuplicateTuple<T> {
    type Key = (T::NodeAddress, u16);

    fn key(&self) -> Self::Key {
        (self.originator.clone(), self.seqno)
    }

    fn table(state: &State<T>) -> &Table<Self::Key, Self> {
        &state.duplicates
    }

    fn table_mut(state: &mut State<T>) -> &mut Table<Self::Key, Self> {
        &mut state.duplicates
    }
}

impl<T: RoutingSystem> Timed<T> for DuplicateTuple<T> {
    fn timer_key((originator, seqno): &Self::Key) -> TupleKey<T> {
        TupleKey::Duplicate {
            originator: originator.clone(),
            seqno: *seqno,
        }
    }

    fn expired(&self, now: Time) -> bool {
        self.time <= now
    }

    fn deadline(&self, _now: Time) -> Option<Time> {
        Some(self.time)
    }
}
