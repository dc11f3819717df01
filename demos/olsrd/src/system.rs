use std::cell::RefCell;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use log::info;
use olsr::concepts::interface::Interface;
use olsr::concepts::route::RouteEntry;
use olsr::framework::{
    Clock, InterfaceProvider, NetworkSender, RouteSink, RoutingSystem, Time, TimerService,
};
use olsr::timer::{Timer, TimerHandle};
use tokio::time::Instant;

use crate::config::DaemonConfig;

/// IPv4 OLSR, interfaces are identified by their OS name
pub struct Ipv4System;

impl RoutingSystem for Ipv4System {
    type NodeAddress = Ipv4Addr;
    type InterfaceId = String;
}

pub struct WallClock {
    pub start: Instant,
}

impl Clock for WallClock {
    fn now(&self) -> Time {
        self.start.elapsed()
    }
}

/// Pending router timers, ordered by deadline
#[derive(Default)]
pub struct TimerWheel {
    next: u64,
    pending: BTreeMap<(Time, u64), Timer<Ipv4System>>,
    deadlines: BTreeMap<u64, Time>,
}

impl TimerWheel {
    pub fn next_deadline(&self) -> Option<Time> {
        self.pending.keys().next().map(|(at, _)| *at)
    }

    pub fn pop_due(&mut self, now: Time) -> Option<Timer<Ipv4System>> {
        let &(at, handle) = self.pending.keys().next()?;
        if at > now {
            return None;
        }
        self.deadlines.remove(&handle);
        self.pending.remove(&(at, handle))
    }
}

pub struct SharedTimers {
    pub clock: Instant,
    pub wheel: Rc<RefCell<TimerWheel>>,
}

impl TimerService<Ipv4System> for SharedTimers {
    fn schedule_after(&mut self, delay: Duration, timer: Timer<Ipv4System>) -> TimerHandle {
        let mut wheel = self.wheel.borrow_mut();
        wheel.next += 1;
        let handle = wheel.next;
        let at = self.clock.elapsed() + delay;
        wheel.pending.insert((at, handle), timer);
        wheel.deadlines.insert(handle, at);
        TimerHandle(handle)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut wheel = self.wheel.borrow_mut();
        if let Some(at) = wheel.deadlines.remove(&handle.0) {
            wheel.pending.remove(&(at, handle.0));
        }
    }
}

/// Packets the router wants on the air, drained by the socket loop
pub struct Outbox(pub Rc<RefCell<Vec<(String, Bytes)>>>);

impl NetworkSender<Ipv4System> for Outbox {
    fn broadcast(&mut self, interface: &String, packet: Bytes) {
        self.0.borrow_mut().push((interface.clone(), packet));
    }
}

pub struct ConfiguredInterfaces(pub DaemonConfig);

impl InterfaceProvider<Ipv4System> for ConfiguredInterfaces {
    fn interfaces(&self) -> Vec<Interface<Ipv4System>> {
        self.0
            .interfaces
            .iter()
            .map(|i| Interface::new(i.name.clone(), i.address))
            .collect()
    }
}

/// Prints routing table changes, a real deployment would program the kernel here
pub struct LogSink;

impl RouteSink<Ipv4System> for LogSink {
    fn route_added(&mut self, route: &RouteEntry<Ipv4System>) {
        info!("+ {route}");
    }

    fn route_changed(&mut self, old: &RouteEntry<Ipv4System>, new: &RouteEntry<Ipv4System>) {
        info!("~ {old} => {new}");
    }

    fn route_removed(&mut self, route: &RouteEntry<Ipv4System>) {
        info!("- {route}");
    }

    fn neighbour_lost(&mut self, main_address: &Ipv4Addr) {
        info!("neighbour {main_address} lost");
    }
}
