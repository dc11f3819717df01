use crate::concepts::interface::Interface;
use crate::concepts::link::{LinkTuple, NeighbourStatus, NeighbourTuple, TwoHopTuple, Willingness};
use crate::concepts::packet::{
    Hello, HelloLink, LinkCode, LinkType, Message, MessageBody, Mid, NeighbourType, Packet, Tc,
    MAX_PACKET_SIZE, PACKET_HEADER_SIZE,
};
use crate::concepts::route::RouteEntry;
use crate::concepts::topology::{
    DuplicateTuple, InterfaceAssociationTuple, MprSelectorTuple, TopologyTuple,
};
use crate::feedback::RoutingError;
use crate::framework::{Environment, ProtocolParams, RoutingSystem, Time};
use crate::mpr::select_mprs;
use crate::rtable::RoutingTable;
use crate::state::{Expiry, State};
use crate::timer::{Timer, TimerHandle, TupleKey};
use crate::util::{duration_to_emf, increment, seq_num_bigger_than, MAX_SEQ_NUM};
use log::{debug, info, trace, warn};
use rand::Rng;
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

/// Hop limit of flooded messages
const FLOOD_TTL: u8 = 255;

/// An OLSR node. All I/O goes through the [`Environment`], the router itself only reacts to
/// [`Router::handle_packet`] and [`Router::handle_timer`].
pub struct Router<T: RoutingSystem> {
    /// main address, the identity of this node in TC and MID messages
    pub address: T::NodeAddress,
    pub params: ProtocolParams,
    pub state: State<T>,
    pub table: RoutingTable<T>,
    interfaces: Vec<Interface<T>>,
    outbound: VecDeque<Message<T>>,
    flush_timer: Option<TimerHandle>,
    hello_timer: Option<TimerHandle>,
    tc_timer: Option<TimerHandle>,
    mid_timer: Option<TimerHandle>,
    packet_seqno: u16,
    message_seqno: u16,
    running: bool,
    env: Environment<T>,
}

impl<T: RoutingSystem> Router<T> {
    pub fn new(address: T::NodeAddress, env: Environment<T>) -> Self {
        Self::with_params(address, T::config(), env)
    }

    pub fn with_params(address: T::NodeAddress, params: ProtocolParams, env: Environment<T>) -> Self {
        Self {
            address,
            params,
            state: State::new(),
            table: RoutingTable::new(),
            interfaces: Vec::new(),
            outbound: VecDeque::new(),
            flush_timer: None,
            hello_timer: None,
            tc_timer: None,
            mid_timer: None,
            packet_seqno: MAX_SEQ_NUM,
            message_seqno: MAX_SEQ_NUM,
            running: false,
            env,
        }
    }

    /// Reads the interface list and arms the periodic emission timers
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.refresh_interfaces();
        let first = self.hello_period();
        self.hello_timer = Some(self.env.timers.schedule_after(first, Timer::Hello));
        self.tc_timer = Some(self.env.timers.schedule_after(first, Timer::Tc));
        self.mid_timer = Some(self.env.timers.schedule_after(first, Timer::Mid));
        info!(
            "{} started OLSR on {} interface(s)",
            self.address,
            self.interfaces.len()
        );
    }

    /// Cancels every timer and forgets all protocol state, withdrawing every route from the sink
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        for handle in [
            self.hello_timer.take(),
            self.tc_timer.take(),
            self.mid_timer.take(),
            self.flush_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.env.timers.cancel(handle);
        }
        self.outbound.clear();
        self.state.clear(self.env.timers.as_mut());
        let old = std::mem::take(&mut self.table);
        for route in old.iter() {
            self.env.sink.route_removed(route);
        }
        info!("{} stopped OLSR", self.address);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Re-reads the local interfaces, local interface addresses map permanently onto the main address
    pub fn refresh_interfaces(&mut self) {
        let now = self.now();
        let interfaces = self.env.interfaces.interfaces();
        for stale in &self.interfaces {
            if !interfaces.iter().any(|i| i.address == stale.address) {
                self.state.erase::<InterfaceAssociationTuple<T>>(&stale.address, self.env.timers.as_mut());
            }
        }
        for interface in &interfaces {
            self.state.insert(
                InterfaceAssociationTuple {
                    iface_address: interface.address.clone(),
                    main_address: self.address.clone(),
                    time: None,
                },
                now,
                self.env.timers.as_mut(),
            );
        }
        self.interfaces = interfaces;
    }

    pub fn interfaces(&self) -> &[Interface<T>] {
        &self.interfaces
    }

    fn now(&self) -> Time {
        self.env.clock.now()
    }

    /// Random delay in `[0, max_jitter]`
    fn jitter(&mut self) -> Duration {
        let max = self.params.max_jitter;
        if max.is_zero() {
            return Duration::ZERO;
        }
        max.mul_f64(self.env.rng.gen::<f64>())
    }

    pub fn is_local_address(&self, address: &T::NodeAddress) -> bool {
        *address == self.address || self.interfaces.iter().any(|i| i.address == *address)
    }

    fn local_addresses(&self) -> BTreeSet<T::NodeAddress> {
        let mut locals: BTreeSet<_> = self.interfaces.iter().map(|i| i.address.clone()).collect();
        locals.insert(self.address.clone());
        locals
    }

    pub fn main_address_of(&self, address: &T::NodeAddress) -> T::NodeAddress {
        self.state.main_address_of(address)
    }

    pub fn route_to(&self, destination: &T::NodeAddress) -> Option<&RouteEntry<T>> {
        self.table.lookup(destination)
    }

    /// Main addresses of the intermediate hops towards `destination`, followed by the destination
    pub fn route_path(&self, destination: &T::NodeAddress) -> Option<Vec<T::NodeAddress>> {
        self.table.path_to(destination)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry<T>> {
        self.table.iter()
    }

    pub fn mpr_set(&self) -> &BTreeSet<T::NodeAddress> {
        &self.state.mprs
    }

    /// Whether flooded messages received from `sender` are relayed by this node
    pub fn is_forwarding_candidate(&self, sender: &T::NodeAddress) -> bool {
        self.symmetric_link_with(sender, self.now()).is_some()
            && self.state.mpr_selectors.contains(&self.main_address_of(sender))
    }

    fn symmetric_link_with(&self, iface_addr: &T::NodeAddress, now: Time) -> Option<&LinkTuple<T>> {
        self.state
            .links
            .iter()
            .find(|link| link.neighbour_iface_addr == *iface_addr && link.is_symmetric(now))
    }

    /// A link counts for neighbour symmetry unless the link layer reported it lost
    fn link_is_symmetric(&self, link: &LinkTuple<T>, now: Time) -> bool {
        link.is_symmetric(now) && !(self.params.use_link_layer_feedback && link.is_lost(now))
    }

    /// Processes a datagram received on `interface` from the interface address `sender`
    pub fn handle_packet(
        &mut self,
        interface: &T::InterfaceId,
        sender: &T::NodeAddress,
        data: &[u8],
    ) -> Result<(), RoutingError<T>> {
        if !self.running {
            return Ok(());
        }
        let receiver = self
            .interfaces
            .iter()
            .find(|i| i.id == *interface)
            .map(|i| i.address.clone())
            .ok_or_else(|| RoutingError::UnknownInterface {
                id: interface.clone(),
            })?;
        let packet = Packet::<T>::decode(data)?;
        trace!(
            "{} received packet {} with {} message(s) from {}",
            self.address,
            packet.seqno,
            packet.messages.len(),
            sender
        );
        for message in packet.messages {
            self.handle_message(message, &receiver, sender);
        }
        self.update_routes();
        Ok(())
    }

    fn handle_message(&mut self, message: Message<T>, receiver: &T::NodeAddress, sender: &T::NodeAddress) {
        if message.ttl == 0 || self.is_local_address(&message.originator) {
            return;
        }
        let key = (message.originator.clone(), message.seqno);
        let duplicate = self
            .state
            .duplicates
            .find(&key)
            .map(|duplicate| duplicate.interfaces.contains(receiver));
        let seen_here = match duplicate {
            Some(seen_here) => seen_here,
            None => {
                match &message.body {
                    MessageBody::Hello(hello) => self.process_hello(&message, hello, receiver, sender),
                    MessageBody::Tc(tc) => self.process_tc(&message, tc, sender),
                    MessageBody::Mid(mid) => self.process_mid(&message, mid, sender),
                    MessageBody::Unknown { kind, .. } => {
                        debug!(
                            "{} received message of unknown type {} from {}",
                            self.address, kind, message.originator
                        );
                    }
                }
                false
            }
        };
        if !seen_here && !matches!(message.body, MessageBody::Hello(_)) {
            self.forward_default(message, receiver, sender);
        }
    }

    /// RFC 3626, Section 3.4.1. Default Forwarding Algorithm
    fn forward_default(&mut self, mut message: Message<T>, receiver: &T::NodeAddress, sender: &T::NodeAddress) {
        let now = self.now();
        if self.symmetric_link_with(sender, now).is_none() {
            return;
        }
        let key = (message.originator.clone(), message.seqno);
        if self
            .state
            .duplicates
            .find(&key)
            .is_some_and(|duplicate| duplicate.retransmitted)
        {
            return;
        }
        let mut retransmitted = false;
        if message.ttl > 1 && self.is_forwarding_candidate(sender) {
            message.ttl -= 1;
            message.hop_count = message.hop_count.saturating_add(1);
            trace!(
                "{} forwards message {} of {}",
                self.address,
                message.seqno,
                message.originator
            );
            self.enqueue(message);
            retransmitted = true;
        }
        let time = now + self.params.dup_hold_time;
        match self.state.duplicates.find_mut(&key) {
            Some(duplicate) => {
                duplicate.time = time;
                duplicate.retransmitted = retransmitted;
                duplicate.interfaces.push(receiver.clone());
            }
            None => {
                let (originator, seqno) = key;
                self.state.insert(
                    DuplicateTuple {
                        originator,
                        seqno,
                        retransmitted,
                        interfaces: vec![receiver.clone()],
                        time,
                    },
                    now,
                    self.env.timers.as_mut(),
                );
            }
        }
    }

    fn process_hello(&mut self, message: &Message<T>, hello: &Hello<T>, receiver: &T::NodeAddress, sender: &T::NodeAddress) {
        self.link_sensing(message, hello, receiver, sender);
        self.populate_neighbours(message, hello);
        self.populate_two_hops(message, hello);
        self.compute_mprs();
        self.populate_mpr_selectors(message, hello);
    }

    /// RFC 3626, Section 7.1.1. HELLO Message Processing
    fn link_sensing(&mut self, message: &Message<T>, hello: &Hello<T>, receiver: &T::NodeAddress, sender: &T::NodeAddress) {
        let now = self.now();
        let validity = message.validity();
        let key = (receiver.clone(), sender.clone());
        let existing = self.state.links.find(&key).cloned();
        let created = existing.is_none();
        let mut link = existing.unwrap_or_else(|| LinkTuple {
            local_iface_addr: receiver.clone(),
            neighbour_iface_addr: sender.clone(),
            sym_time: now,
            asym_time: now,
            time: now + validity,
            lost_time: None,
        });
        let mut updated = false;

        link.asym_time = now + validity;
        for block in hello.links.iter().filter(|block| block.neighbours.contains(receiver)) {
            match block.code.link_type {
                LinkType::Lost => {
                    link.sym_time = now;
                    updated = true;
                }
                LinkType::Symmetric | LinkType::Asymmetric => {
                    link.sym_time = now + validity;
                    link.time = link.sym_time + self.params.neighbour_hold_time;
                    link.lost_time = None;
                    updated = true;
                }
                LinkType::Unspecified => {}
            }
        }
        link.time = link.time.max(link.asym_time);

        if created {
            trace!("{} adds link {} -> {}", self.address, receiver, sender);
            self.state.insert(link.clone(), now, self.env.timers.as_mut());
        } else if let Some(stored) = self.state.links.find_mut(&key) {
            *stored = link.clone();
        }
        if (created || updated) && self.update_neighbour(&link, Some(hello.willingness), now) {
            let main = self.main_address_of(sender);
            info!("{} lost neighbour {}", self.address, main);
            self.forget_neighbour(&main);
        }
    }

    /// Derives the neighbour status from all links towards the neighbour, returns whether the neighbour stopped being symmetric
    fn update_neighbour(&mut self, link: &LinkTuple<T>, willingness: Option<Willingness>, now: Time) -> bool {
        let main = self.main_address_of(&link.neighbour_iface_addr);
        let symmetric = self.state.links.iter().any(|l| {
            self.main_address_of(&l.neighbour_iface_addr) == main && self.link_is_symmetric(l, now)
        });
        let status = if symmetric {
            NeighbourStatus::Symmetric
        } else {
            NeighbourStatus::NotSymmetric
        };
        let previous = match self.state.neighbours.find_mut(&main) {
            Some(neighbour) => {
                let previous = neighbour.status;
                neighbour.status = status;
                if let Some(willingness) = willingness {
                    neighbour.willingness = willingness;
                }
                Some(previous)
            }
            None => {
                if main != link.neighbour_iface_addr {
                    // the neighbour was known by its interface address before its MID arrived
                    self.state.neighbours.take(&link.neighbour_iface_addr);
                }
                self.state.neighbours.put(
                    main.clone(),
                    NeighbourTuple {
                        main_address: main.clone(),
                        willingness: willingness.unwrap_or_default(),
                        status,
                    },
                );
                None
            }
        };
        if status == NeighbourStatus::Symmetric && previous != Some(NeighbourStatus::Symmetric) {
            debug!("{} has a new symmetric neighbour {}", self.address, main);
            // a symmetric neighbour is no longer a 2-hop neighbour
            self.state
                .erase_matching::<TwoHopTuple<T>>(|t| t.two_hop_address == main, self.env.timers.as_mut());
        }
        status == NeighbourStatus::NotSymmetric && previous == Some(NeighbourStatus::Symmetric)
    }

    /// RFC 3626, Section 8.1.1. Populating the Neighbor Set
    fn populate_neighbours(&mut self, message: &Message<T>, hello: &Hello<T>) {
        if let Some(neighbour) = self.state.neighbours.find_mut(&message.originator) {
            neighbour.willingness = hello.willingness;
        }
    }

    /// RFC 3626, Section 8.2.1. Populating the 2-hop Neighbor Set
    fn populate_two_hops(&mut self, message: &Message<T>, hello: &Hello<T>) {
        let now = self.now();
        let originator = &message.originator;
        let symmetric = self.state.links.iter().any(|link| {
            self.main_address_of(&link.neighbour_iface_addr) == *originator && link.is_symmetric(now)
        });
        if !symmetric {
            return;
        }
        let time = now + message.validity();
        for block in &hello.links {
            for address in &block.neighbours {
                let two_hop = self.main_address_of(address);
                let key = (originator.clone(), two_hop.clone());
                match block.code.neighbour_type {
                    NeighbourType::Symmetric | NeighbourType::Mpr => {
                        if self.is_local_address(&two_hop)
                            || self.state.neighbours.find(&two_hop).is_some_and(|nb| nb.is_symmetric())
                        {
                            continue;
                        }
                        if let Some(tuple) = self.state.two_hops.find_mut(&key) {
                            tuple.time = time;
                        } else {
                            trace!("{} adds 2-hop neighbour {} via {}", self.address, two_hop, originator);
                            self.state.insert(
                                TwoHopTuple {
                                    neighbour_main_address: originator.clone(),
                                    two_hop_address: two_hop,
                                    time,
                                },
                                now,
                                self.env.timers.as_mut(),
                            );
                        }
                    }
                    NeighbourType::NotNeighbour => {
                        self.state
                            .erase::<TwoHopTuple<T>>(&key, self.env.timers.as_mut());
                    }
                }
            }
        }
    }

    /// RFC 3626, Section 8.4.1. Populating the MPR selector set
    fn populate_mpr_selectors(&mut self, message: &Message<T>, hello: &Hello<T>) {
        let now = self.now();
        let selected = hello
            .links
            .iter()
            .filter(|block| block.code.neighbour_type == NeighbourType::Mpr)
            .flat_map(|block| block.neighbours.iter())
            .any(|address| self.main_address_of(address) == self.address);
        if !selected {
            return;
        }
        let originator = &message.originator;
        let time = now + message.validity();
        if let Some(selector) = self.state.mpr_selectors.find_mut(originator) {
            selector.time = time;
        } else {
            debug!("{} was selected as MPR by {}", self.address, originator);
            self.state.insert(
                MprSelectorTuple {
                    main_address: originator.clone(),
                    time,
                },
                now,
                self.env.timers.as_mut(),
            );
        }
    }

    fn compute_mprs(&mut self) {
        let mprs = select_mprs(&self.address, &self.state.neighbours, &self.state.two_hops);
        if mprs != self.state.mprs {
            debug!("{} selected MPR set {:?}", self.address, mprs);
            self.env.sink.mpr_set_changed(&mprs);
            self.state.mprs = mprs;
        }
    }

    /// RFC 3626, Section 9.5. TC Message Processing
    fn process_tc(&mut self, message: &Message<T>, tc: &Tc<T>, sender: &T::NodeAddress) {
        let now = self.now();
        if self.symmetric_link_with(sender, now).is_none() {
            return;
        }
        let originator = &message.originator;
        if self
            .state
            .topology
            .iter()
            .any(|t| t.last_address == *originator && seq_num_bigger_than(t.seqno, tc.ansn))
        {
            trace!("{} ignores outdated TC {} of {}", self.address, tc.ansn, originator);
            return;
        }
        self.state.erase_matching::<TopologyTuple<T>>(
            |t| t.last_address == *originator && seq_num_bigger_than(tc.ansn, t.seqno),
            self.env.timers.as_mut(),
        );
        let time = now + message.validity();
        for dest in &tc.neighbours {
            let key = (dest.clone(), originator.clone());
            if let Some(tuple) = self.state.topology.find_mut(&key) {
                tuple.time = time;
            } else {
                self.state.insert(
                    TopologyTuple {
                        dest_address: dest.clone(),
                        last_address: originator.clone(),
                        seqno: tc.ansn,
                        time,
                    },
                    now,
                    self.env.timers.as_mut(),
                );
            }
        }
    }

    /// RFC 3626, Section 5.4. MID Message Processing
    fn process_mid(&mut self, message: &Message<T>, mid: &Mid<T>, sender: &T::NodeAddress) {
        let now = self.now();
        if self.symmetric_link_with(sender, now).is_none() {
            return;
        }
        let time = now + message.validity();
        for iface in &mid.interfaces {
            if self.is_local_address(iface) {
                continue;
            }
            match self.state.interface_associations.find_mut(iface) {
                Some(association) if association.main_address == message.originator => {
                    association.time = Some(time);
                }
                _ => {
                    trace!("{} learns {} is an interface of {}", self.address, iface, message.originator);
                    self.state.insert(
                        InterfaceAssociationTuple {
                            iface_address: iface.clone(),
                            main_address: message.originator.clone(),
                            time: Some(time),
                        },
                        now,
                        self.env.timers.as_mut(),
                    );
                }
            }
        }
    }

    /// Recomputes the routing table and reports the differences to the sink
    fn update_routes(&mut self) {
        let table = RoutingTable::compute(&self.state, &self.local_addresses(), self.now());
        let old = std::mem::replace(&mut self.table, table);
        for route in self.table.iter() {
            match old.lookup(&route.destination) {
                None => {
                    debug!("{} adds route {}", self.address, route);
                    self.env.sink.route_added(route);
                }
                Some(previous) if !previous.same_forwarding(route) => {
                    debug!("{} changes route {}", self.address, route);
                    self.env.sink.route_changed(previous, route);
                }
                Some(_) => {}
            }
        }
        for route in old.iter() {
            if self.table.lookup(&route.destination).is_none() {
                debug!("{} removes route {}", self.address, route);
                self.env.sink.route_removed(route);
            }
        }
    }

    /// Delivers a timer that was scheduled by this router
    pub fn handle_timer(&mut self, timer: Timer<T>) {
        if !self.running {
            return;
        }
        match timer {
            Timer::Hello => {
                self.send_hello();
                let delay = self.periodic_delay(self.hello_period());
                self.hello_timer = Some(self.env.timers.schedule_after(delay, Timer::Hello));
            }
            Timer::Tc => {
                if !self.state.mpr_selectors.is_empty() {
                    self.send_tc();
                }
                let delay = self.periodic_delay(self.params.tc_interval);
                self.tc_timer = Some(self.env.timers.schedule_after(delay, Timer::Tc));
            }
            Timer::Mid => {
                self.send_mid();
                let delay = self.periodic_delay(self.params.mid_interval);
                self.mid_timer = Some(self.env.timers.schedule_after(delay, Timer::Mid));
            }
            Timer::Flush => {
                self.flush_timer = None;
                self.flush();
            }
            Timer::Expire { key, generation } => self.expire(key, generation),
        }
    }

    /// HELLOs list every link, so each one refreshes the whole link set
    fn hello_period(&self) -> Duration {
        self.params.hello_interval.min(self.params.refresh_interval)
    }

    fn periodic_delay(&mut self, interval: Duration) -> Duration {
        interval.saturating_sub(self.jitter())
    }

    fn expire(&mut self, key: TupleKey<T>, generation: u64) {
        let now = self.now();
        let timers = self.env.timers.as_mut();
        match key {
            TupleKey::Link { local, neighbour } => {
                let key = (local, neighbour);
                match self.state.expire::<LinkTuple<T>>(&key, generation, now, timers) {
                    Expiry::Expired(link) => self.remove_link(link, now),
                    Expiry::Pending => {
                        let Some(link) = self.state.links.find(&key).cloned() else {
                            return;
                        };
                        if !link.is_symmetric(now) {
                            self.neighbour_loss(&link, now);
                        }
                    }
                    Expiry::Stale => {}
                }
            }
            TupleKey::TwoHop { neighbour, two_hop } => {
                if let Expiry::Expired(tuple) =
                    self.state.expire::<TwoHopTuple<T>>(&(neighbour, two_hop), generation, now, timers)
                {
                    trace!(
                        "{} drops 2-hop neighbour {} via {}",
                        self.address,
                        tuple.two_hop_address,
                        tuple.neighbour_main_address
                    );
                    self.compute_mprs();
                    self.update_routes();
                }
            }
            TupleKey::MprSelector(address) => {
                if let Expiry::Expired(_) =
                    self.state.expire::<MprSelectorTuple<T>>(&address, generation, now, timers)
                {
                    debug!("{} is no longer MPR of {}", self.address, address);
                }
            }
            TupleKey::Topology { dest, last } => {
                if let Expiry::Expired(_) =
                    self.state.expire::<TopologyTuple<T>>(&(dest, last), generation, now, timers)
                {
                    self.update_routes();
                }
            }
            TupleKey::InterfaceAssociation(address) => {
                if let Expiry::Expired(_) =
                    self.state.expire::<InterfaceAssociationTuple<T>>(&address, generation, now, timers)
                {
                    self.update_routes();
                }
            }
            TupleKey::Duplicate { originator, seqno } => {
                let _ = self
                    .state
                    .expire::<DuplicateTuple<T>>(&(originator, seqno), generation, now, timers);
            }
        }
    }

    /// RFC 3626, Section 8.5. Neighbor Loss
    fn neighbour_loss(&mut self, link: &LinkTuple<T>, now: Time) {
        if !self.update_neighbour(link, None, now) {
            return;
        }
        let main = self.main_address_of(&link.neighbour_iface_addr);
        info!("{} lost neighbour {}", self.address, main);
        self.forget_neighbour(&main);
    }

    /// Drops the information that depended on `main` being a symmetric neighbour
    fn forget_neighbour(&mut self, main: &T::NodeAddress) {
        let timers = self.env.timers.as_mut();
        self.state
            .erase_matching::<TwoHopTuple<T>>(|t| t.neighbour_main_address == *main, timers);
        self.state
            .erase_matching::<MprSelectorTuple<T>>(|s| s.main_address == *main, timers);
        self.compute_mprs();
        self.update_routes();
        self.env.sink.neighbour_lost(main);
    }

    fn remove_link(&mut self, link: LinkTuple<T>, now: Time) {
        let main = self.main_address_of(&link.neighbour_iface_addr);
        trace!(
            "{} removes link {} -> {}",
            self.address,
            link.local_iface_addr,
            link.neighbour_iface_addr
        );
        let was_symmetric = self.state.neighbours.find(&main).is_some_and(|nb| nb.is_symmetric());
        let remaining = self
            .state
            .links
            .iter()
            .find(|l| self.main_address_of(&l.neighbour_iface_addr) == main)
            .cloned();
        match remaining {
            Some(other) => {
                self.update_neighbour(&other, None, now);
            }
            None => {
                self.state.neighbours.take(&main);
            }
        }
        let symmetric = self.state.neighbours.find(&main).is_some_and(|nb| nb.is_symmetric());
        if was_symmetric && !symmetric {
            info!("{} lost neighbour {}", self.address, main);
            self.forget_neighbour(&main);
        } else {
            self.compute_mprs();
            self.update_routes();
        }
    }

    /// Link layer feedback: the next hop towards `destination` could not be reached.
    /// Ignored unless `use_link_layer_feedback` is enabled.
    pub fn link_failed(&mut self, destination: &T::NodeAddress) {
        if !self.running || !self.params.use_link_layer_feedback {
            return;
        }
        let now = self.now();
        let Some(next_hop) = self.table.lookup(destination).map(|route| route.next_hop.clone()) else {
            return;
        };
        warn!("{} link layer reports {} unreachable", self.address, next_hop);
        let keys: Vec<_> = self
            .state
            .links
            .iter()
            .filter(|link| link.neighbour_iface_addr == next_hop)
            .map(|link| (link.local_iface_addr.clone(), link.neighbour_iface_addr.clone()))
            .collect();
        let hold = now + self.params.neighbour_hold_time;
        for key in keys {
            let Some(link) = self.state.links.find_mut(&key) else {
                continue;
            };
            link.lost_time = Some(hold);
            link.time = hold;
            let link = link.clone();
            self.state
                .rearm::<LinkTuple<T>>(&key, now, self.env.timers.as_mut());
            self.neighbour_loss(&link, now);
        }
    }

    fn next_message_seqno(&mut self) -> u16 {
        increment(&mut self.message_seqno);
        self.message_seqno
    }

    fn next_packet_seqno(&mut self) -> u16 {
        increment(&mut self.packet_seqno);
        self.packet_seqno
    }

    /// RFC 3626, Section 6.2. HELLO Message Generation
    fn send_hello(&mut self) {
        let now = self.now();
        let mut links: Vec<HelloLink<T>> = Vec::new();
        for link in self.state.links.iter().filter(|link| link.is_alive(now)) {
            let link_type = if self.params.use_link_layer_feedback && link.is_lost(now) {
                LinkType::Lost
            } else if link.is_symmetric(now) {
                LinkType::Symmetric
            } else if link.is_asymmetric(now) {
                LinkType::Asymmetric
            } else {
                LinkType::Lost
            };
            let main = self.main_address_of(&link.neighbour_iface_addr);
            let neighbour_type = if self.state.mprs.contains(&main) {
                NeighbourType::Mpr
            } else {
                match self.state.neighbours.find(&main) {
                    Some(nb) if nb.is_symmetric() => NeighbourType::Symmetric,
                    Some(_) => NeighbourType::NotNeighbour,
                    None => {
                        warn!("{} has a link to {} without neighbour entry", self.address, main);
                        continue;
                    }
                }
            };
            let Some(code) = LinkCode::new(link_type, neighbour_type) else {
                continue;
            };
            match links.iter_mut().find(|block| block.code == code) {
                Some(block) => block.neighbours.push(link.neighbour_iface_addr.clone()),
                None => links.push(HelloLink {
                    code,
                    neighbours: vec![link.neighbour_iface_addr.clone()],
                }),
            }
        }
        let message = Message {
            vtime: duration_to_emf(self.params.neighbour_hold_time),
            originator: self.address.clone(),
            ttl: 1,
            hop_count: 0,
            seqno: self.next_message_seqno(),
            body: MessageBody::Hello(Hello {
                htime: duration_to_emf(self.params.hello_interval),
                willingness: self.params.willingness,
                links,
            }),
        };
        trace!("{} sends HELLO {}", self.address, message.seqno);
        self.enqueue(message);
    }

    /// RFC 3626, Section 9.3. TC Message Generation
    fn send_tc(&mut self) {
        let neighbours = self
            .state
            .mpr_selectors
            .iter()
            .map(|selector| selector.main_address.clone())
            .collect();
        let message = Message {
            vtime: duration_to_emf(self.params.topology_hold_time),
            originator: self.address.clone(),
            ttl: FLOOD_TTL,
            hop_count: 0,
            seqno: self.next_message_seqno(),
            body: MessageBody::Tc(Tc {
                ansn: self.state.ansn,
                neighbours,
            }),
        };
        trace!("{} sends TC with ANSN {}", self.address, self.state.ansn);
        self.enqueue(message);
    }

    /// RFC 3626, Section 5.2. MID Message Generation
    fn send_mid(&mut self) {
        if self.params.optimized_mid && self.interfaces.len() <= 1 {
            return;
        }
        let interfaces: Vec<_> = self
            .interfaces
            .iter()
            .map(|i| i.address.clone())
            .filter(|address| *address != self.address)
            .collect();
        if interfaces.is_empty() {
            return;
        }
        let message = Message {
            vtime: duration_to_emf(self.params.mid_hold_time),
            originator: self.address.clone(),
            ttl: FLOOD_TTL,
            hop_count: 0,
            seqno: self.next_message_seqno(),
            body: MessageBody::Mid(Mid { interfaces }),
        };
        trace!("{} sends MID", self.address);
        self.enqueue(message);
    }

    /// Queues a message, the queue is flushed after a random delay so that neighbours do not transmit in lockstep
    fn enqueue(&mut self, message: Message<T>) {
        self.outbound.push_back(message);
        if self.flush_timer.is_none() {
            let delay = self.jitter();
            self.flush_timer = Some(self.env.timers.schedule_after(delay, Timer::Flush));
        }
    }

    /// Splits the queue into packets of at most `max_messages` messages that fit the packet length field
    fn flush(&mut self) {
        let per_packet = self.params.max_messages.max(1);
        while !self.outbound.is_empty() {
            let mut size = PACKET_HEADER_SIZE;
            let mut count = 0;
            for message in self.outbound.iter().take(per_packet) {
                let len = message.encoded_len();
                if count > 0 && size + len > MAX_PACKET_SIZE {
                    break;
                }
                size += len;
                count += 1;
            }
            let messages = self.outbound.drain(..count).collect();
            let packet = Packet {
                seqno: self.next_packet_seqno(),
                messages,
            };
            let bytes = packet.encode();
            for interface in &self.interfaces {
                self.env.sender.broadcast(&interface.id, bytes.clone());
            }
        }
    }
}
