use std::collections::BTreeSet;

use crate::concepts::link::{NeighbourTuple, TwoHopTuple, Willingness};
use crate::framework::RoutingSystem;
use crate::state::Table;

type Coverage<'a, A> = Vec<(&'a A, &'a A)>;

/// Computes the MPR set of `local` (RFC 3626, Section 8.3.1)
///
/// Every strict 2-hop neighbour reachable through a willing symmetric neighbour ends up covered by at
/// least one selected MPR. Ties are broken by address order, so the result is deterministic.
pub fn select_mprs<T: RoutingSystem>(
    local: &T::NodeAddress,
    neighbours: &Table<T::NodeAddress, NeighbourTuple<T>>,
    two_hops: &Table<(T::NodeAddress, T::NodeAddress), TwoHopTuple<T>>,
) -> BTreeSet<T::NodeAddress> {
    let n: Vec<&NeighbourTuple<T>> = neighbours.iter().filter(|nb| nb.is_symmetric()).collect();
    let is_symmetric = |addr: &T::NodeAddress| n.iter().any(|nb| nb.main_address == *addr);

    // (neighbour, 2-hop neighbour) pairs still to be covered
    let mut n2: Coverage<T::NodeAddress> = two_hops
        .iter()
        .filter(|t| t.two_hop_address != *local)
        .filter(|t| !is_symmetric(&t.two_hop_address))
        .filter(|t| {
            n.iter().any(|nb| {
                nb.main_address == t.neighbour_main_address && nb.willingness != Willingness::NEVER
            })
        })
        .map(|t| (&t.neighbour_main_address, &t.two_hop_address))
        .collect();

    let mut mprs = BTreeSet::new();

    for nb in n.iter().filter(|nb| nb.willingness == Willingness::ALWAYS) {
        mprs.insert(nb.main_address.clone());
        cover(&mut n2, &nb.main_address);
    }

    // neighbours that are the only way to reach some 2-hop neighbour
    let sole: BTreeSet<&T::NodeAddress> = n2
        .iter()
        .filter(|(via, two_hop)| {
            !n2.iter()
                .any(|(other_via, other)| other == two_hop && other_via != via)
        })
        .map(|(via, _)| *via)
        .collect();
    for via in sole {
        mprs.insert(via.clone());
        cover(&mut n2, via);
    }

    while !n2.is_empty() {
        let mut best: Option<(&NeighbourTuple<T>, usize, usize)> = None;
        for &nb in &n {
            let reach = n2.iter().filter(|(via, _)| **via == nb.main_address).count();
            if reach == 0 {
                continue;
            }
            let degree = degree(nb, neighbours, two_hops);
            let better = match best {
                None => true,
                Some((chosen, chosen_reach, chosen_degree)) => {
                    (nb.willingness, reach, degree) > (chosen.willingness, chosen_reach, chosen_degree)
                }
            };
            if better {
                best = Some((nb, reach, degree));
            }
        }
        let Some((chosen, _, _)) = best else {
            break;
        };
        mprs.insert(chosen.main_address.clone());
        cover(&mut n2, &chosen.main_address);
    }
    mprs
}

/// Drops every pair whose 2-hop neighbour is reachable through `via`
fn cover<A: Ord>(n2: &mut Coverage<A>, via: &A) {
    let reached: BTreeSet<&A> = n2
        .iter()
        .filter(|(v, _)| *v == via)
        .map(|(_, two_hop)| *two_hop)
        .collect();
    n2.retain(|(_, two_hop)| !reached.contains(two_hop));
}

/// Number of 2-hop neighbours reachable through `nb` that are not neighbours themselves
fn degree<T: RoutingSystem>(
    nb: &NeighbourTuple<T>,
    neighbours: &Table<T::NodeAddress, NeighbourTuple<T>>,
    two_hops: &Table<(T::NodeAddress, T::NodeAddress), TwoHopTuple<T>>,
) -> usize {
    two_hops
        .iter()
        .filter(|t| t.neighbour_main_address == nb.main_address && !neighbours.contains(&t.two_hop_address))
        .count()
}
