use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use olsr::concepts::interface::Interface;
use olsr::concepts::packet::Packet;
use olsr::concepts::route::RouteEntry;
use olsr::framework::{
    Clock, Environment, InterfaceProvider, NetworkSender, RouteSink, RoutingSystem, Time,
    TimerService,
};
use olsr::router::Router;
use olsr::timer::{Timer, TimerHandle};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub struct VirtualSystem;

impl RoutingSystem for VirtualSystem {
    type NodeAddress = Ipv4Addr;
    type InterfaceId = u8;
}

/// (node index, interface id)
pub type Endpoint = (usize, u8);

/// Address of interface `iface` of node `node`
pub fn addr_of(node: usize, iface: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, iface, 0, node as u8 + 1)
}

/// Main address of node `node`
pub fn addr(node: usize) -> Ipv4Addr {
    addr_of(node, 0)
}

#[derive(Default)]
struct TimerQueue {
    next: u64,
    pending: BTreeMap<(Time, u64), (usize, Timer<VirtualSystem>)>,
    deadlines: BTreeMap<u64, Time>,
}

impl TimerQueue {
    fn pop_due(&mut self, until: Time) -> Option<(Time, usize, Timer<VirtualSystem>)> {
        let (&(at, handle), _) = self.pending.iter().next()?;
        if at > until {
            return None;
        }
        let (node, timer) = self.pending.remove(&(at, handle))?;
        self.deadlines.remove(&handle);
        Some((at, node, timer))
    }
}

struct VirtualClock(Rc<Cell<Time>>);

impl Clock for VirtualClock {
    fn now(&self) -> Time {
        self.0.get()
    }
}

struct VirtualTimers {
    node: usize,
    clock: Rc<Cell<Time>>,
    queue: Rc<RefCell<TimerQueue>>,
}

impl TimerService<VirtualSystem> for VirtualTimers {
    fn schedule_after(&mut self, delay: Duration, timer: Timer<VirtualSystem>) -> TimerHandle {
        let mut queue = self.queue.borrow_mut();
        queue.next += 1;
        let handle = queue.next;
        let at = self.clock.get() + delay;
        queue.pending.insert((at, handle), (self.node, timer));
        queue.deadlines.insert(handle, at);
        TimerHandle(handle)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut queue = self.queue.borrow_mut();
        if let Some(at) = queue.deadlines.remove(&handle.0) {
            queue.pending.remove(&(at, handle.0));
        }
    }
}

struct Transmission {
    from: Endpoint,
    packet: Bytes,
}

struct VirtualSender {
    node: usize,
    medium: Rc<RefCell<Vec<Transmission>>>,
}

impl NetworkSender<VirtualSystem> for VirtualSender {
    fn broadcast(&mut self, interface: &u8, packet: Bytes) {
        self.medium.borrow_mut().push(Transmission {
            from: (self.node, *interface),
            packet,
        });
    }
}

struct StaticInterfaces(Vec<Interface<VirtualSystem>>);

impl InterfaceProvider<VirtualSystem> for StaticInterfaces {
    fn interfaces(&self) -> Vec<Interface<VirtualSystem>> {
        self.0.clone()
    }
}

/// Everything a router reported to its host
#[derive(Default)]
pub struct SinkLog {
    pub added: Vec<RouteEntry<VirtualSystem>>,
    pub changed: Vec<(RouteEntry<VirtualSystem>, RouteEntry<VirtualSystem>)>,
    pub removed: Vec<RouteEntry<VirtualSystem>>,
    pub lost: Vec<Ipv4Addr>,
    /// every MPR set the router switched to
    pub mpr_sets: Vec<BTreeSet<Ipv4Addr>>,
}

struct RecordingSink(Rc<RefCell<SinkLog>>);

impl RouteSink<VirtualSystem> for RecordingSink {
    fn route_added(&mut self, route: &RouteEntry<VirtualSystem>) {
        self.0.borrow_mut().added.push(route.clone());
    }

    fn route_changed(&mut self, old: &RouteEntry<VirtualSystem>, new: &RouteEntry<VirtualSystem>) {
        self.0.borrow_mut().changed.push((old.clone(), new.clone()));
    }

    fn route_removed(&mut self, route: &RouteEntry<VirtualSystem>) {
        self.0.borrow_mut().removed.push(route.clone());
    }

    fn neighbour_lost(&mut self, main_address: &Ipv4Addr) {
        self.0.borrow_mut().lost.push(*main_address);
    }

    fn mpr_set_changed(&mut self, mprs: &BTreeSet<Ipv4Addr>) {
        self.0.borrow_mut().mpr_sets.push(mprs.clone());
    }
}

/// A set of routers sharing a virtual clock. Packets are delivered instantly over the edges,
/// timers fire in deadline order.
pub struct VirtualNetwork {
    pub routers: Vec<Router<VirtualSystem>>,
    pub sinks: Vec<Rc<RefCell<SinkLog>>>,
    clock: Rc<Cell<Time>>,
    timers: Rc<RefCell<TimerQueue>>,
    medium: Rc<RefCell<Vec<Transmission>>>,
    edges: BTreeSet<(Endpoint, Endpoint)>,
    /// number of packets put on the medium so far
    pub transmissions: usize,
    /// every packet put on the medium, with the interface that sent it
    pub sent: Vec<(Endpoint, Bytes)>,
}

impl VirtualNetwork {
    /// `interfaces[i]` is the number of interfaces of node i, `edges` connect node interfaces
    pub fn create(interfaces: &[u8], edges: &[(Endpoint, Endpoint)]) -> VirtualNetwork {
        let clock = Rc::new(Cell::new(Duration::ZERO));
        let timers = Rc::new(RefCell::new(TimerQueue::default()));
        let medium = Rc::new(RefCell::new(Vec::new()));
        let mut sinks = Vec::new();
        let routers = interfaces
            .iter()
            .enumerate()
            .map(|(node, count)| {
                let sink = Rc::new(RefCell::new(SinkLog::default()));
                sinks.push(sink.clone());
                let env = Environment {
                    clock: Box::new(VirtualClock(clock.clone())),
                    timers: Box::new(VirtualTimers {
                        node,
                        clock: clock.clone(),
                        queue: timers.clone(),
                    }),
                    sender: Box::new(VirtualSender {
                        node,
                        medium: medium.clone(),
                    }),
                    interfaces: Box::new(StaticInterfaces(
                        (0..*count)
                            .map(|iface| Interface::new(iface, addr_of(node, iface)))
                            .collect(),
                    )),
                    sink: Box::new(RecordingSink(sink)),
                    rng: Box::new(StdRng::seed_from_u64(node as u64)),
                };
                Router::new(addr(node), env)
            })
            .collect();
        let mut network = VirtualNetwork {
            routers,
            sinks,
            clock,
            timers,
            medium,
            edges: edges.iter().copied().collect(),
            transmissions: 0,
            sent: Vec::new(),
        };
        for router in &mut network.routers {
            router.start();
        }
        network
    }

    pub fn now(&self) -> Time {
        self.clock.get()
    }

    pub fn node(&self, node: usize) -> &Router<VirtualSystem> {
        &self.routers[node]
    }

    pub fn node_mut(&mut self, node: usize) -> &mut Router<VirtualSystem> {
        &mut self.routers[node]
    }

    pub fn sink(&self, node: usize) -> std::cell::Ref<'_, SinkLog> {
        self.sinks[node].borrow()
    }

    /// Number of output flushes `node` has scheduled and that did not fire yet
    pub fn pending_flushes(&self, node: usize) -> usize {
        self.timers
            .borrow()
            .pending
            .values()
            .filter(|(owner, timer)| *owner == node && matches!(timer, Timer::Flush))
            .count()
    }

    /// Decoded packets sent by `node` out of interface `iface`
    pub fn sent_by(&self, node: usize, iface: u8) -> Vec<Packet<VirtualSystem>> {
        self.sent
            .iter()
            .filter(|(from, _)| *from == (node, iface))
            .map(|(_, packet)| Packet::decode(packet).expect("routers emit well formed packets"))
            .collect()
    }

    pub fn remove_edge(&mut self, a: Endpoint, b: Endpoint) {
        self.edges.remove(&(a, b));
        self.edges.remove(&(b, a));
    }

    pub fn add_edge(&mut self, a: Endpoint, b: Endpoint) {
        self.edges.insert((a, b));
    }

    /// Hands a raw datagram to a router as if `sender` had sent it
    pub fn inject(&mut self, node: usize, iface: u8, sender: Ipv4Addr, packet: &[u8]) {
        self.routers[node]
            .handle_packet(&iface, &sender, packet)
            .expect("injected packet is well formed");
        self.deliver();
    }

    fn deliver(&mut self) {
        loop {
            let batch = std::mem::take(&mut *self.medium.borrow_mut());
            if batch.is_empty() {
                break;
            }
            self.transmissions += batch.len();
            for transmission in batch {
                self.sent.push((transmission.from, transmission.packet.clone()));
                let (from_node, from_iface) = transmission.from;
                let sender = addr_of(from_node, from_iface);
                let receivers: Vec<Endpoint> = self
                    .edges
                    .iter()
                    .filter_map(|&(a, b)| {
                        if a == transmission.from {
                            Some(b)
                        } else if b == transmission.from {
                            Some(a)
                        } else {
                            None
                        }
                    })
                    .collect();
                for (node, iface) in receivers {
                    self.routers[node]
                        .handle_packet(&iface, &sender, &transmission.packet)
                        .expect("routers emit well formed packets");
                }
            }
        }
    }

    /// Advances the virtual clock, firing timers and delivering packets along the way
    pub fn run_for(&mut self, duration: Duration) {
        let until = self.clock.get() + duration;
        loop {
            self.deliver();
            let due = self.timers.borrow_mut().pop_due(until);
            let Some((at, node, timer)) = due else {
                break;
            };
            self.clock.set(at);
            self.routers[node].handle_timer(timer);
        }
        self.clock.set(until);
        self.deliver();
    }

    pub fn run_secs(&mut self, secs: u64) {
        self.run_for(Duration::from_secs(secs));
    }
}
