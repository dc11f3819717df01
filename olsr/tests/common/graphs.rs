use crate::common::virtual_network::VirtualNetwork;

/// n single interface nodes, each connected to the next
pub fn vnet_line(n: usize) -> VirtualNetwork {
    let edges: Vec<_> = (1..n).map(|i| ((i - 1, 0), (i, 0))).collect();
    VirtualNetwork::create(&vec![1; n], &edges)
}

///     1
///   /   \
/// 0       3 - 4
///   \   /
///     2
pub fn vnet_diamond() -> VirtualNetwork {
    VirtualNetwork::create(
        &[1, 1, 1, 1, 1],
        &[
            ((0, 0), (1, 0)),
            ((0, 0), (2, 0)),
            ((1, 0), (3, 0)),
            ((2, 0), (3, 0)),
            ((3, 0), (4, 0)),
        ],
    )
}

/// Node 1 has two interfaces, node 0 sits on the first and node 2 on the second
pub fn vnet_two_interfaces() -> VirtualNetwork {
    VirtualNetwork::create(&[1, 2, 1], &[((0, 0), (1, 0)), ((1, 1), (2, 0))])
}
