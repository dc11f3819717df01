use crate::framework::{RoutingSystem, TimerService};
use educe::Educe;
use std::collections::HashMap;
use std::time::Duration;

/// Opaque handle returned by a [`TimerService`], used for cancellation
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TimerHandle(pub u64);

/// Natural key of a timed tuple
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()), Eq, Hash(bound()))]
pub enum TupleKey<T: RoutingSystem + ?Sized> {
    Link { local: T::NodeAddress, neighbour: T::NodeAddress },
    TwoHop { neighbour: T::NodeAddress, two_hop: T::NodeAddress },
    MprSelector(T::NodeAddress),
    Topology { dest: T::NodeAddress, last: T::NodeAddress },
    InterfaceAssociation(T::NodeAddress),
    Duplicate { originator: T::NodeAddress, seqno: u16 },
}

/// Events the host delivers back through [`crate::router::Router::handle_timer`]
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub enum Timer<T: RoutingSystem + ?Sized> {
    Hello,
    Tc,
    Mid,
    /// Drains the outbound message queue into packets
    Flush,
    /// A tuple reached its deadline. `generation` tells apart events of a tuple that was since re-armed.
    Expire { key: TupleKey<T>, generation: u64 },
}

struct Armed {
    handle: TimerHandle,
    generation: u64,
}

/// Keeps at most one armed timer per tuple
pub(crate) struct TimerBook<T: RoutingSystem + ?Sized> {
    armed: HashMap<TupleKey<T>, Armed>,
    next_generation: u64,
}

impl<T: RoutingSystem + ?Sized> TimerBook<T> {
    pub fn new() -> Self {
        TimerBook {
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn arm(&mut self, key: TupleKey<T>, delay: Duration, timers: &mut dyn TimerService<T>) {
        self.disarm(&key, timers);
        self.next_generation += 1;
        let generation = self.next_generation;
        let handle = timers.schedule_after(
            delay,
            Timer::Expire {
                key: key.clone(),
                generation,
            },
        );
        self.armed.insert(key, Armed { handle, generation });
    }

    pub fn disarm(&mut self, key: &TupleKey<T>, timers: &mut dyn TimerService<T>) {
        if let Some(armed) = self.armed.remove(key) {
            timers.cancel(armed.handle);
        }
    }

    /// Consumes the armed timer if `generation` is the latest one for `key`
    pub fn fire(&mut self, key: &TupleKey<T>, generation: u64) -> bool {
        match self.armed.get(key) {
            Some(armed) if armed.generation == generation => {
                self.armed.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, key: &TupleKey<T>) -> bool {
        self.armed.contains_key(key)
    }

    pub fn clear(&mut self, timers: &mut dyn TimerService<T>) {
        for (_, armed) in self.armed.drain() {
            timers.cancel(armed.handle);
        }
    }
}
