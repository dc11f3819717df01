use std::collections::BTreeSet;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes};
use cfg_if::cfg_if;
use rand::RngCore;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::concepts::interface::Interface;
use crate::concepts::link::Willingness;
use crate::concepts::route::RouteEntry;
use crate::timer::{Timer, TimerHandle};

/// Point in time, measured from whatever epoch the [`Clock`] uses
pub type Time = Duration;

pub trait RoutingSystem {
    /// Address of an OLSR interface. Main addresses are drawn from the same space, and MUST be globally unique
    type NodeAddress: OlsrKey + OlsrData + Ord + Display + WireAddress;
    /// Handle for a local interface, passed back to the [`NetworkSender`]
    type InterfaceId: OlsrKey + OlsrData + Ord;
    fn config() -> ProtocolParams {
        Default::default()
    }
}

cfg_if! {
    if #[cfg(feature = "serde")] {
        pub trait OlsrData: Clone + Debug + Serialize + serde::de::DeserializeOwned + Sized {}
        impl<T: Clone + Debug + Serialize + serde::de::DeserializeOwned + Sized> OlsrData for T {}
    } else {
        pub trait OlsrData: Clone + Debug + Sized {}
        impl<T: Clone + Debug + Sized> OlsrData for T {}
    }
}
pub trait OlsrKey: Eq + PartialEq + Hash {}
impl<T: Eq + PartialEq + Hash> OlsrKey for T {}

/// Fixed-width address encoding used inside OLSR messages
pub trait WireAddress: Sized {
    /// Encoded length in bytes, all addresses of a system share it
    const SIZE: usize;
    fn write(&self, buf: &mut impl BufMut);
    /// Callers guarantee `buf.remaining() >= Self::SIZE`
    fn read(buf: &mut impl Buf) -> Self;
}

impl WireAddress for Ipv4Addr {
    const SIZE: usize = 4;

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.octets());
    }

    fn read(buf: &mut impl Buf) -> Self {
        Ipv4Addr::from(buf.get_u32())
    }
}

impl WireAddress for Ipv6Addr {
    const SIZE: usize = 16;

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.octets());
    }

    fn read(buf: &mut impl Buf) -> Self {
        let mut octets = [0u8; 16];
        buf.copy_to_slice(&mut octets);
        Ipv6Addr::from(octets)
    }
}

pub trait Clock {
    fn now(&self) -> Time;
}

/// One-shot timers. A cancelled timer MUST NOT be delivered back to the router.
pub trait TimerService<T: RoutingSystem + ?Sized> {
    fn schedule_after(&mut self, delay: Duration, timer: Timer<T>) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

pub trait NetworkSender<T: RoutingSystem + ?Sized> {
    /// Broadcasts an encoded OLSR packet out of the given interface
    fn broadcast(&mut self, interface: &T::InterfaceId, packet: Bytes);
}

pub trait InterfaceProvider<T: RoutingSystem + ?Sized> {
    fn interfaces(&self) -> Vec<Interface<T>>;
}

/// Receives the differences between successive routing tables, so that the host can program its kernel
pub trait RouteSink<T: RoutingSystem + ?Sized> {
    fn route_added(&mut self, route: &RouteEntry<T>);
    fn route_changed(&mut self, old: &RouteEntry<T>, new: &RouteEntry<T>);
    fn route_removed(&mut self, route: &RouteEntry<T>);
    /// A symmetric neighbour was lost, either through timeout or link layer feedback
    fn neighbour_lost(&mut self, _main_address: &T::NodeAddress) {}
    /// The set of neighbours relaying this node's flooded messages changed
    fn mpr_set_changed(&mut self, _mprs: &BTreeSet<T::NodeAddress>) {}
}

/// Everything the router needs from the outside world
pub struct Environment<T: RoutingSystem + ?Sized> {
    pub clock: Box<dyn Clock>,
    pub timers: Box<dyn TimerService<T>>,
    pub sender: Box<dyn NetworkSender<T>>,
    pub interfaces: Box<dyn InterfaceProvider<T>>,
    pub sink: Box<dyn RouteSink<T>>,
    /// Source of jitter
    pub rng: Box<dyn RngCore>,
}

/// RFC 3626, Section 18. Proposed Values for Constants
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ProtocolParams {
    pub hello_interval: Duration,
    /// Every link is advertised at least this often, HELLOs go out at the shorter of both intervals
    pub refresh_interval: Duration,
    pub tc_interval: Duration,
    pub mid_interval: Duration,
    pub neighbour_hold_time: Duration,
    pub topology_hold_time: Duration,
    pub mid_hold_time: Duration,
    pub dup_hold_time: Duration,
    /// Upper bound of the random delay applied to emissions
    pub max_jitter: Duration,
    /// Messages per outgoing packet
    pub max_messages: usize,
    pub willingness: Willingness,
    /// Trust the link layer when it reports a failed transmission
    pub use_link_layer_feedback: bool,
    /// Skip MID emission on single interface nodes
    pub optimized_mid: bool,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        let hello_interval = Duration::from_secs(2);
        Self {
            hello_interval,
            refresh_interval: Duration::from_secs(2),
            tc_interval: Duration::from_secs(5),
            mid_interval: Duration::from_secs(5),
            neighbour_hold_time: hello_interval * 3,
            topology_hold_time: Duration::from_secs(15),
            mid_hold_time: Duration::from_secs(15),
            dup_hold_time: Duration::from_secs(30),
            max_jitter: hello_interval / 4,
            max_messages: 64,
            willingness: Willingness::DEFAULT,
            use_link_layer_feedback: false,
            optimized_mid: true,
        }
    }
}
