use crate::concepts::link::Willingness;
use crate::feedback::DecodeError;
use crate::framework::{RoutingSystem, WireAddress};
use crate::util::emf_to_duration;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use educe::Educe;
use std::time::Duration;

pub const HELLO_MESSAGE: u8 = 1;
pub const TC_MESSAGE: u8 = 2;
pub const MID_MESSAGE: u8 = 3;

/// Packet length and packet sequence number
pub const PACKET_HEADER_SIZE: usize = 4;

/// Largest packet or message the 16 bit length fields can describe
pub const MAX_PACKET_SIZE: usize = u16::MAX as usize;

/// Size of a message header carrying addresses of `T`
pub fn message_header_size<T: RoutingSystem + ?Sized>() -> usize {
    8 + T::NodeAddress::SIZE
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LinkType {
    Unspecified,
    Asymmetric,
    Symmetric,
    Lost,
}

impl LinkType {
    fn bits(self) -> u8 {
        match self {
            LinkType::Unspecified => 0,
            LinkType::Asymmetric => 1,
            LinkType::Symmetric => 2,
            LinkType::Lost => 3,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => LinkType::Unspecified,
            1 => LinkType::Asymmetric,
            2 => LinkType::Symmetric,
            _ => LinkType::Lost,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NeighbourType {
    NotNeighbour,
    Symmetric,
    Mpr,
}

impl NeighbourType {
    fn bits(self) -> u8 {
        match self {
            NeighbourType::NotNeighbour => 0,
            NeighbourType::Symmetric => 1,
            NeighbourType::Mpr => 2,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(NeighbourType::NotNeighbour),
            1 => Some(NeighbourType::Symmetric),
            2 => Some(NeighbourType::Mpr),
            _ => None,
        }
    }
}

/// RFC 3626, Section 6.1.1. Link Code as Link Type and Neighbor Type
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LinkCode {
    pub link_type: LinkType,
    pub neighbour_type: NeighbourType,
}

impl LinkCode {
    /// A symmetric link to a node that is not a symmetric neighbour is not a valid combination
    pub fn new(link_type: LinkType, neighbour_type: NeighbourType) -> Option<Self> {
        if link_type == LinkType::Symmetric && neighbour_type == NeighbourType::NotNeighbour {
            return None;
        }
        Some(LinkCode { link_type, neighbour_type })
    }

    pub fn to_byte(self) -> u8 {
        self.link_type.bits() | (self.neighbour_type.bits() << 2)
    }

    /// Codes above 15 and invalid combinations yield `None`, their blocks are skipped
    pub fn from_byte(code: u8) -> Option<Self> {
        let neighbour_type = NeighbourType::from_bits(code >> 2)?;
        LinkCode::new(LinkType::from_bits(code), neighbour_type)
    }
}

/// One link message block of a HELLO
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct HelloLink<T: RoutingSystem + ?Sized> {
    pub code: LinkCode,
    pub neighbours: Vec<T::NodeAddress>,
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct Hello<T: RoutingSystem + ?Sized> {
    /// emission interval of the sender, mantissa/exponent encoded
    pub htime: u8,
    pub willingness: Willingness,
    pub links: Vec<HelloLink<T>>,
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct Tc<T: RoutingSystem + ?Sized> {
    /// advertised neighbour sequence number
    pub ansn: u16,
    pub neighbours: Vec<T::NodeAddress>,
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct Mid<T: RoutingSystem + ?Sized> {
    pub interfaces: Vec<T::NodeAddress>,
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub enum MessageBody<T: RoutingSystem + ?Sized> {
    Hello(Hello<T>),
    Tc(Tc<T>),
    Mid(Mid<T>),
    /// Message types this router does not understand are still forwarded
    Unknown { kind: u8, payload: Bytes },
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct Message<T: RoutingSystem + ?Sized> {
    /// validity time, mantissa/exponent encoded
    pub vtime: u8,
    pub originator: T::NodeAddress,
    pub ttl: u8,
    pub hop_count: u8,
    pub seqno: u16,
    pub body: MessageBody<T>,
}

#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()))]
pub struct Packet<T: RoutingSystem + ?Sized> {
    pub seqno: u16,
    pub messages: Vec<Message<T>>,
}

fn addresses_len<T: RoutingSystem + ?Sized>(addresses: &[T::NodeAddress]) -> usize {
    addresses.len() * T::NodeAddress::SIZE
}

fn put_addresses<T: RoutingSystem + ?Sized>(buf: &mut impl BufMut, addresses: &[T::NodeAddress]) {
    for address in addresses {
        address.write(buf);
    }
}

fn get_addresses<T: RoutingSystem + ?Sized>(
    buf: &mut impl Buf,
    what: &'static str,
) -> Result<Vec<T::NodeAddress>, DecodeError> {
    if buf.remaining() % T::NodeAddress::SIZE != 0 {
        return Err(DecodeError::MalformedBody(what));
    }
    let mut addresses = Vec::with_capacity(buf.remaining() / T::NodeAddress::SIZE);
    while buf.has_remaining() {
        addresses.push(T::NodeAddress::read(buf));
    }
    Ok(addresses)
}

impl<T: RoutingSystem + ?Sized> Hello<T> {
    fn encoded_len(&self) -> usize {
        4 + self
            .links
            .iter()
            .map(|link| 4 + addresses_len::<T>(&link.neighbours))
            .sum::<usize>()
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16(0);
        buf.put_u8(self.htime);
        buf.put_u8(self.willingness.value());
        for link in &self.links {
            buf.put_u8(link.code.to_byte());
            buf.put_u8(0);
            buf.put_u16((4 + addresses_len::<T>(&link.neighbours)) as u16);
            put_addresses::<T>(buf, &link.neighbours);
        }
    }

    fn decode(mut raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.remaining() < 4 {
            return Err(DecodeError::MalformedBody("HELLO"));
        }
        raw.advance(2);
        let htime = raw.get_u8();
        let willingness = Willingness::from_bits(raw.get_u8());
        let mut links = Vec::new();
        while raw.has_remaining() {
            if raw.remaining() < 4 {
                return Err(DecodeError::MalformedBody("HELLO"));
            }
            let code = raw.get_u8();
            raw.advance(1);
            let size = raw.get_u16() as usize;
            if size < 4 || size - 4 > raw.remaining() {
                return Err(DecodeError::MalformedBody("HELLO"));
            }
            let (mut block, rest) = raw.split_at(size - 4);
            raw = rest;
            let neighbours = get_addresses::<T>(&mut block, "HELLO")?;
            if let Some(code) = LinkCode::from_byte(code) {
                links.push(HelloLink { code, neighbours });
            }
        }
        Ok(Hello { htime, willingness, links })
    }
}

impl<T: RoutingSystem + ?Sized> Tc<T> {
    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.ansn);
        buf.put_u16(0);
        put_addresses::<T>(buf, &self.neighbours);
    }

    fn decode(mut raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.remaining() < 4 {
            return Err(DecodeError::MalformedBody("TC"));
        }
        let ansn = raw.get_u16();
        raw.advance(2);
        let neighbours = get_addresses::<T>(&mut raw, "TC")?;
        Ok(Tc { ansn, neighbours })
    }
}

impl<T: RoutingSystem + ?Sized> MessageBody<T> {
    pub fn kind(&self) -> u8 {
        match self {
            MessageBody::Hello(_) => HELLO_MESSAGE,
            MessageBody::Tc(_) => TC_MESSAGE,
            MessageBody::Mid(_) => MID_MESSAGE,
            MessageBody::Unknown { kind, .. } => *kind,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            MessageBody::Hello(hello) => hello.encoded_len(),
            MessageBody::Tc(tc) => 4 + addresses_len::<T>(&tc.neighbours),
            MessageBody::Mid(mid) => addresses_len::<T>(&mid.interfaces),
            MessageBody::Unknown { payload, .. } => payload.len(),
        }
    }

    fn encode(&self, buf: &mut impl BufMut) {
        match self {
            MessageBody::Hello(hello) => hello.encode(buf),
            MessageBody::Tc(tc) => tc.encode(buf),
            MessageBody::Mid(mid) => put_addresses::<T>(buf, &mid.interfaces),
            MessageBody::Unknown { payload, .. } => buf.put_slice(payload),
        }
    }

    fn decode(kind: u8, mut raw: &[u8]) -> Result<Self, DecodeError> {
        Ok(match kind {
            HELLO_MESSAGE => MessageBody::Hello(Hello::decode(raw)?),
            TC_MESSAGE => MessageBody::Tc(Tc::decode(raw)?),
            MID_MESSAGE => MessageBody::Mid(Mid {
                interfaces: get_addresses::<T>(&mut raw, "MID")?,
            }),
            kind => MessageBody::Unknown {
                kind,
                payload: Bytes::copy_from_slice(raw),
            },
        })
    }
}

impl<T: RoutingSystem + ?Sized> Message<T> {
    pub fn kind(&self) -> u8 {
        self.body.kind()
    }

    /// How long the information in this message stays valid
    pub fn validity(&self) -> Duration {
        emf_to_duration(self.vtime)
    }

    pub fn encoded_len(&self) -> usize {
        message_header_size::<T>() + self.body.encoded_len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let len = self.encoded_len();
        debug_assert!(len <= MAX_PACKET_SIZE, "message of {len} bytes overflows its length field");
        buf.put_u8(self.kind());
        buf.put_u8(self.vtime);
        buf.put_u16(len as u16);
        self.originator.write(buf);
        buf.put_u8(self.ttl);
        buf.put_u8(self.hop_count);
        buf.put_u16(self.seqno);
        self.body.encode(buf);
    }

    /// Decodes exactly one message, `raw` must span the whole message
    fn decode(mut raw: &[u8]) -> Result<Self, DecodeError> {
        let kind = raw.get_u8();
        let vtime = raw.get_u8();
        raw.advance(2);
        let originator = T::NodeAddress::read(&mut raw);
        let ttl = raw.get_u8();
        let hop_count = raw.get_u8();
        let seqno = raw.get_u16();
        Ok(Message {
            vtime,
            originator,
            ttl,
            hop_count,
            seqno,
            body: MessageBody::decode(kind, raw)?,
        })
    }
}

impl<T: RoutingSystem + ?Sized> Packet<T> {
    pub fn encoded_len(&self) -> usize {
        PACKET_HEADER_SIZE + self.messages.iter().map(Message::encoded_len).sum::<usize>()
    }

    pub fn encode(&self) -> Bytes {
        let len = self.encoded_len();
        debug_assert!(len <= MAX_PACKET_SIZE, "packet of {len} bytes overflows its length field");
        let mut buf = BytesMut::with_capacity(len);
        buf.put_u16(len as u16);
        buf.put_u16(self.seqno);
        for message in &self.messages {
            message.encode(&mut buf);
        }
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = data;
        if buf.remaining() < PACKET_HEADER_SIZE {
            return Err(DecodeError::ShortPacket(data.len()));
        }
        let declared = buf.get_u16() as usize;
        let seqno = buf.get_u16();
        if declared < PACKET_HEADER_SIZE || declared > data.len() {
            return Err(DecodeError::LengthMismatch {
                declared,
                actual: data.len(),
            });
        }
        let mut buf = &data[PACKET_HEADER_SIZE..declared];

        let header_size = message_header_size::<T>();
        let mut messages = Vec::new();
        while buf.has_remaining() {
            if buf.remaining() < header_size {
                return Err(DecodeError::ShortMessage(buf.remaining()));
            }
            let size = u16::from_be_bytes([buf[2], buf[3]]) as usize;
            if size < header_size {
                return Err(DecodeError::ShortMessage(size));
            }
            if size > buf.remaining() {
                return Err(DecodeError::MessageOverrun {
                    size,
                    remaining: buf.remaining(),
                });
            }
            let (message, rest) = buf.split_at(size);
            messages.push(Message::decode(message)?);
            buf = rest;
        }
        if messages.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Packet { seqno, messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct V4;
    impl RoutingSystem for V4 {
        type NodeAddress = Ipv4Addr;
        type InterfaceId = u8;
    }

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn message(seqno: u16, body: MessageBody<V4>) -> Message<V4> {
        Message {
            vtime: 0x86,
            originator: addr(1),
            ttl: 255,
            hop_count: 0,
            seqno,
            body,
        }
    }

    #[test]
    fn hello_wire_layout() {
        let packet = Packet::<V4> {
            seqno: 7,
            messages: vec![message(
                9,
                MessageBody::Hello(Hello {
                    htime: 0x05,
                    willingness: Willingness::HIGH,
                    links: vec![HelloLink {
                        code: LinkCode::new(LinkType::Symmetric, NeighbourType::Mpr).unwrap(),
                        neighbours: vec![addr(2)],
                    }],
                }),
            )],
        };
        let bytes = packet.encode();
        assert_eq!(
            bytes.as_ref(),
            &[
                0, 28, 0, 7, // packet header
                HELLO_MESSAGE, 0x86, 0, 24, 10, 0, 0, 1, 255, 0, 0, 9, // message header
                0, 0, 0x05, 6, // hello header
                0x0a, 0, 0, 8, 10, 0, 0, 2, // link block
            ]
        );
        assert_eq!(Packet::<V4>::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn mixed_messages_decode() {
        let packet = Packet::<V4> {
            seqno: 65535,
            messages: vec![
                message(1, MessageBody::Tc(Tc { ansn: 3, neighbours: vec![addr(4), addr(5)] })),
                message(2, MessageBody::Mid(Mid { interfaces: vec![addr(9)] })),
                message(3, MessageBody::Unknown { kind: 130, payload: Bytes::from_static(&[1, 2, 3, 4]) }),
            ],
        };
        let decoded = Packet::<V4>::decode(&packet.encode()).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.messages[0].validity(), Duration::from_secs(6));
    }

    #[test]
    fn invalid_link_codes_are_skipped() {
        let hello = Hello::<V4> {
            htime: 0x05,
            willingness: Willingness::DEFAULT,
            links: vec![HelloLink {
                code: LinkCode::new(LinkType::Asymmetric, NeighbourType::NotNeighbour).unwrap(),
                neighbours: vec![addr(2)],
            }],
        };
        let mut raw = BytesMut::new();
        hello.encode(&mut raw);
        // SYM_LINK together with NOT_NEIGH
        raw.put_slice(&[0x02, 0, 0, 8, 10, 0, 0, 3]);
        // link code above 15
        raw.put_slice(&[0x1a, 0, 0, 8, 10, 0, 0, 4]);
        let decoded = Hello::<V4>::decode(&raw).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert_eq!(Packet::<V4>::decode(&[0, 4]), Err(DecodeError::ShortPacket(2)));
        assert_eq!(Packet::<V4>::decode(&[0, 4, 0, 1]), Err(DecodeError::Empty));
        assert_eq!(
            Packet::<V4>::decode(&[0, 40, 0, 1, 0, 0]),
            Err(DecodeError::LengthMismatch { declared: 40, actual: 6 })
        );

        let packet = Packet::<V4> {
            seqno: 1,
            messages: vec![message(1, MessageBody::Mid(Mid { interfaces: vec![addr(9)] }))],
        };
        let mut bytes = packet.encode().to_vec();
        // message claims more bytes than the packet holds
        bytes[7] = 40;
        assert_eq!(
            Packet::<V4>::decode(&bytes),
            Err(DecodeError::MessageOverrun { size: 40, remaining: 16 })
        );
        bytes[7] = 6;
        assert_eq!(Packet::<V4>::decode(&bytes), Err(DecodeError::ShortMessage(6)));
    }

    #[test]
    fn ipv6_addresses_widen_the_header() {
        struct V6;
        impl RoutingSystem for V6 {
            type NodeAddress = std::net::Ipv6Addr;
            type InterfaceId = u8;
        }

        let originator = "fd00::1".parse().unwrap();
        let packet = Packet::<V6> {
            seqno: 2,
            messages: vec![Message {
                vtime: 0x86,
                originator,
                ttl: 255,
                hop_count: 0,
                seqno: 4,
                body: MessageBody::Tc(Tc { ansn: 1, neighbours: vec!["fd00::2".parse().unwrap()] }),
            }],
        };
        let bytes = packet.encode();
        assert_eq!(message_header_size::<V6>(), 24);
        assert_eq!(bytes.len(), 4 + 24 + 4 + 16);
        assert_eq!(Packet::<V6>::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn misaligned_addresses_are_rejected() {
        let raw = [0u8, 1, 0, 0, 10, 0, 0];
        assert_eq!(Tc::<V4>::decode(&raw), Err(DecodeError::MalformedBody("TC")));
    }
}
