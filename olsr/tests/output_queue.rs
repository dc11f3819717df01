use std::net::Ipv4Addr;
use std::time::Duration;

use bytes::Bytes;
use common::virtual_network::{addr, VirtualSystem};
use olsr::concepts::packet::{Message, MessageBody, Packet, HELLO_MESSAGE, MID_MESSAGE};
use olsr::util::duration_to_emf;

mod common;

/// (packet seqno, [(message kind, message seqno)])
fn layout(packets: &[Packet<VirtualSystem>]) -> Vec<(u16, Vec<(u8, u16)>)> {
    packets
        .iter()
        .map(|p| (p.seqno, p.messages.iter().map(|m| (m.kind(), m.seqno)).collect()))
        .collect()
}

#[test]
fn burst_shares_one_flush_and_packet() {
    // node 1 has two interfaces, so its first burst holds a HELLO and a MID
    let mut network = common::graphs::vnet_two_interfaces();
    network.run_secs(2);
    assert_eq!(network.pending_flushes(1), 1);
    assert!(network.sent_by(1, 0).is_empty());

    network.run_for(Duration::from_millis(600));
    assert_eq!(network.pending_flushes(1), 0);
    let expected = vec![(0, vec![(HELLO_MESSAGE, 0), (MID_MESSAGE, 1)])];
    assert_eq!(layout(&network.sent_by(1, 0)), expected);
    assert_eq!(layout(&network.sent_by(1, 1)), expected);
}

#[test]
fn long_queue_spills_into_more_packets() {
    let mut network = common::graphs::vnet_two_interfaces();
    network.node_mut(1).params.max_messages = 1;
    network.run_for(Duration::from_millis(2600));

    assert_eq!(
        layout(&network.sent_by(1, 0)),
        vec![(0, vec![(HELLO_MESSAGE, 0)]), (1, vec![(MID_MESSAGE, 1)])]
    );
    assert_eq!(network.pending_flushes(1), 0);
}

#[test]
fn large_messages_are_split_by_size() {
    let mut network = common::graphs::vnet_line(3);
    network.run_secs(12);

    let origin = Ipv4Addr::new(10, 0, 0, 77);
    for seqno in [600, 601] {
        let packet = Packet::<VirtualSystem> {
            seqno,
            messages: vec![Message {
                vtime: duration_to_emf(Duration::from_secs(15)),
                originator: origin,
                ttl: 10,
                hop_count: 0,
                seqno,
                body: MessageBody::Unknown { kind: 200, payload: Bytes::from(vec![7; 40_000]) },
            }],
        }
        .encode();
        network.inject(1, 0, addr(0), &packet);
    }
    network.run_secs(1);

    // both relayed copies together would overflow the 16 bit packet length
    let relayed: Vec<_> = network
        .sent_by(1, 0)
        .into_iter()
        .filter(|p| p.messages.iter().any(|m| m.originator == origin))
        .collect();
    assert_eq!(relayed.len(), 2);
    for packet in &relayed {
        assert_eq!(packet.messages.iter().filter(|m| m.originator == origin).count(), 1);
        assert!(packet.encoded_len() <= u16::MAX as usize);
    }
}
