use std::collections::BTreeSet;

use common::virtual_network::addr;
use olsr::concepts::link::NeighbourStatus;

mod common;

#[test]
fn line_converges() {
    let mut network = common::graphs::vnet_line(3);
    network.run_secs(12); // just make it converge

    let (a, b, c) = (addr(0), addr(1), addr(2));

    // at node b
    let neighbours: Vec<_> = network
        .node(1)
        .state
        .neighbours
        .iter()
        .map(|nb| (nb.main_address, nb.status))
        .collect();
    assert_eq!(neighbours, vec![(a, NeighbourStatus::Symmetric), (c, NeighbourStatus::Symmetric)]);
    assert!(network.node(1).mpr_set().is_empty());
    let selectors: Vec<_> = network.node(1).state.mpr_selectors.iter().map(|s| s.main_address).collect();
    assert_eq!(selectors, vec![a, c]);

    // at node a
    let router = network.node(0);
    assert!(router.state.two_hops.find(&(b, c)).is_some());
    assert_eq!(router.mpr_set().iter().copied().collect::<Vec<_>>(), vec![b]);
    assert_eq!(network.sink(0).mpr_sets, vec![BTreeSet::from([b])]);
    assert!(router.state.topology.find(&(c, b)).is_some());

    let route = router.route_to(&c).expect("no route to c");
    assert_eq!(route.distance, 2);
    assert_eq!(route.next_hop, b);
    assert_eq!(router.route_path(&c), Some(vec![b, c]));
    assert_eq!(router.route_to(&b).map(|r| r.distance), Some(1));
    assert!(router.route_to(&a).is_none());

    let added: Vec<_> = network.sink(0).added.iter().map(|r| r.destination).collect();
    assert!(added.contains(&b));
    assert!(added.contains(&c));
}

#[test]
fn diamond_equal_relays_prefer_the_last_one() {
    let mut network = common::graphs::vnet_diamond();
    network.run_secs(20);

    // 1 and 2 are equally willing, the later 2-hop tuple wins
    let router = network.node(0);
    let route = router.route_to(&addr(3)).expect("no route to 3");
    assert_eq!(route.distance, 2);
    assert_eq!(route.next_hop, addr(2));

    let route = router.route_to(&addr(4)).expect("no route to 4");
    assert_eq!(route.distance, 3);
    assert_eq!(route.next_hop, addr(2));
    assert_eq!(router.route_path(&addr(4)), Some(vec![addr(2), addr(3), addr(4)]));

    // every node reaches every other node
    for (i, router) in network.routers.iter().enumerate() {
        for j in 0..network.routers.len() {
            if i != j {
                assert!(router.route_to(&addr(j)).is_some(), "{i} has no route to {j}");
            }
        }
    }
}

#[test]
fn hop_counts_are_shortest() {
    let mut network = common::graphs::vnet_line(5);
    network.run_secs(30);

    for (i, router) in network.routers.iter().enumerate() {
        for j in 0..5 {
            let route = router.route_to(&addr(j));
            if i == j {
                assert!(route.is_none());
            } else {
                assert_eq!(route.map(|r| r.distance), Some(i.abs_diff(j) as u32), "{i} -> {j}");
            }
        }
    }
}

#[test]
fn stop_withdraws_everything() {
    let mut network = common::graphs::vnet_line(3);
    network.run_secs(12);
    let routes = network.node(1).routes().count();
    assert_eq!(routes, 2);

    network.node_mut(1).stop();
    assert!(!network.node(1).is_running());
    assert!(network.node(1).state.links.is_empty());
    assert!(network.node(1).table.is_empty());
    assert_eq!(network.sink(1).removed.len(), routes);

    network.run_secs(20);
    assert!(network.node(0).state.neighbours.is_empty());
    assert!(network.node(0).route_to(&addr(1)).is_none());
}
