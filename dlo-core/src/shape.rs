use crate::{Error, Result};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// An edge between two adjacent nodes of the same DLO.
///
/// The second index is always the first index plus one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Edge(pub usize, pub usize);

impl Edge {
    /// The edge starting at node `i`.
    pub fn starting_at(i: usize) -> Self {
        Self(i, i + 1)
    }

    /// The endpoints of this edge in `nodes`.
    pub fn endpoints(self, nodes: &[Point3<f64>]) -> (Point3<f64>, Point3<f64>) {
        (nodes[self.0], nodes[self.1])
    }
}

/// The ordered node chain(s) approximating the centerline of one or more DLOs.
///
/// With `num_of_dlos() > 1` the DLOs are concatenated: nodes `0..nodes_per_dlo` belong to the
/// first DLO, the next `nodes_per_dlo` nodes to the second, and so on. The node count is fixed
/// for the lifetime of a tracking session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TrackedShape {
    nodes: Vec<Point3<f64>>,
    nodes_per_dlo: usize,
}

impl TrackedShape {
    /// Creates a shape, checking that `nodes` splits evenly into DLOs of `nodes_per_dlo` nodes.
    pub fn new(nodes: Vec<Point3<f64>>, nodes_per_dlo: usize) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::invalid("a tracked shape needs at least one node"));
        }
        if nodes_per_dlo == 0 {
            return Err(Error::invalid("nodes_per_dlo must be positive"));
        }
        if nodes.len() % nodes_per_dlo != 0 {
            return Err(Error::InvalidInput(format!(
                "{} nodes do not split into DLOs of {} nodes",
                nodes.len(),
                nodes_per_dlo
            )));
        }
        Ok(Self {
            nodes,
            nodes_per_dlo,
        })
    }

    /// A single DLO of `num_nodes` evenly spaced nodes from `start` to `end` inclusive.
    pub fn straight_line(start: Point3<f64>, end: Point3<f64>, num_nodes: usize) -> Result<Self> {
        let nodes = match num_nodes {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step: Vector3<f64> = (end - start) / (num_nodes - 1) as f64;
                (0..num_nodes).map(|i| start + step * i as f64).collect()
            }
        };
        Self::new(nodes, num_nodes.max(1))
    }

    pub fn nodes(&self) -> &[Point3<f64>] {
        &self.nodes
    }

    /// Mutable access to the node positions. The node count cannot change through this.
    pub fn nodes_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.nodes
    }

    /// Replaces every node position at once.
    pub fn set_nodes(&mut self, nodes: Vec<Point3<f64>>) -> Result<()> {
        if nodes.len() != self.nodes.len() {
            return Err(Error::InvalidInput(format!(
                "expected {} nodes, got {}",
                self.nodes.len(),
                nodes.len()
            )));
        }
        self.nodes = nodes;
        Ok(())
    }

    pub fn into_nodes(self) -> Vec<Point3<f64>> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes_per_dlo(&self) -> usize {
        self.nodes_per_dlo
    }

    pub fn num_of_dlos(&self) -> usize {
        self.nodes.len() / self.nodes_per_dlo
    }

    /// Whether the edge starting at node `i` would cross from one DLO into the next.
    ///
    /// Such an edge is not part of the shape.
    pub fn is_last_edge_of_dlo(&self, i: usize) -> bool {
        (i + 1) % self.nodes_per_dlo == 0
    }

    /// Every edge of every DLO, in node order.
    pub fn edges(&self) -> Vec<Edge> {
        (0..self.nodes.len().saturating_sub(1))
            .filter(|&i| !self.is_last_edge_of_dlo(i))
            .map(Edge::starting_at)
            .collect()
    }

    /// The edges of DLO number `dlo`.
    pub fn dlo_edges(&self, dlo: usize) -> impl Iterator<Item = Edge> {
        let start = dlo * self.nodes_per_dlo;
        (start..start + self.nodes_per_dlo.saturating_sub(1)).map(Edge::starting_at)
    }

    /// The nodes of DLO number `dlo`, or `None` if there is no such DLO.
    pub fn dlo_nodes(&self, dlo: usize) -> Option<&[Point3<f64>]> {
        let start = dlo.checked_mul(self.nodes_per_dlo)?;
        self.nodes.get(start..start.checked_add(self.nodes_per_dlo)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_uneven_split() {
        let nodes = vec![Point3::origin(); 7];
        assert!(matches!(
            TrackedShape::new(nodes, 3),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn edges_skip_dlo_boundaries() {
        let nodes = (0..6).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let shape = TrackedShape::new(nodes, 3).unwrap();
        assert_eq!(shape.num_of_dlos(), 2);
        assert_eq!(
            shape.edges(),
            vec![Edge(0, 1), Edge(1, 2), Edge(3, 4), Edge(4, 5)]
        );
        assert_eq!(shape.dlo_edges(1).collect::<Vec<_>>(), vec![Edge(3, 4), Edge(4, 5)]);
    }

    #[test]
    fn dlo_nodes_out_of_range() {
        let nodes = (0..6).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let shape = TrackedShape::new(nodes, 3).unwrap();
        assert_eq!(
            shape.dlo_nodes(1).map(|nodes| nodes[0]),
            Some(Point3::new(3.0, 0.0, 0.0))
        );
        assert_eq!(shape.dlo_nodes(2), None);
        assert_eq!(shape.dlo_nodes(usize::MAX), None);
    }

    #[test]
    fn straight_line_is_evenly_spaced() {
        let shape =
            TrackedShape::straight_line(Point3::origin(), Point3::new(0.0, 0.4, 0.0), 5).unwrap();
        assert_eq!(shape.len(), 5);
        for (i, node) in shape.nodes().iter().enumerate() {
            assert!((node.y - 0.1 * i as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn set_nodes_keeps_node_count() {
        let mut shape =
            TrackedShape::straight_line(Point3::origin(), Point3::new(1.0, 0.0, 0.0), 4).unwrap();
        assert!(shape.set_nodes(vec![Point3::origin(); 3]).is_err());
        assert!(shape.set_nodes(vec![Point3::origin(); 4]).is_ok());
    }
}
