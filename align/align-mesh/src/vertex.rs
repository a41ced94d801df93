//! Mesh vertices: active lattice vertices and externally attached passive
//! vertices.

use align_types::Point;
use nalgebra::{Point2, Vector2};

use crate::Spring;

/// An intra-mesh spring edge from one active vertex to another.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    /// Index of the neighboring active vertex.
    pub target: usize,
    /// Spring parameters of the edge.
    pub spring: Spring,
}

/// An active lattice vertex.
///
/// Identity is positional: two vertices are the same vertex iff they live at
/// the same index of the same mesh. The vertex's `(local, world)` pair is
/// the per-vertex control match used for emit.
#[derive(Debug, Clone)]
pub struct Vertex {
    point: Point,
    edges: Vec<Edge>,
    force: Vector2<f64>,
}

impl Vertex {
    pub(crate) fn new(local: Point2<f64>) -> Self {
        Self {
            point: Point::new(local),
            edges: Vec::new(),
            force: Vector2::zeros(),
        }
    }

    /// Rest (lattice) position.
    #[must_use]
    pub fn local(&self) -> Point2<f64> {
        self.point.local
    }

    /// Current deformed position.
    #[must_use]
    pub fn world(&self) -> Point2<f64> {
        self.point.world
    }

    /// The vertex's local/world pair.
    #[must_use]
    pub fn point(&self) -> Point {
        self.point
    }

    /// Number of intra-mesh spring edges.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    /// Magnitude of the most recently accumulated force.
    #[must_use]
    pub fn force(&self) -> f64 {
        self.force.norm()
    }

    pub(crate) fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub(crate) fn add_edge(&mut self, target: usize, spring: Spring) {
        self.edges.push(Edge { target, spring });
    }

    pub(crate) fn set_world(&mut self, world: Point2<f64>) {
        self.point.world = world;
    }

    pub(crate) fn set_force(&mut self, force: Vector2<f64>) {
        self.force = force;
    }

    pub(crate) fn force_vector(&self) -> Vector2<f64> {
        self.force
    }

    pub(crate) fn rescale(&mut self, inv_scale: f64, offset: Vector2<f64>) {
        self.point.local = Point2::from(self.point.local.coords * inv_scale + offset);
        self.point.world = Point2::from(self.point.world.coords * inv_scale + offset);
    }
}

/// The active match that owns a passive vertex: the source vertex of the
/// inter-mesh spring the passive vertex was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassiveOwner {
    /// Slot of the mesh holding the owning active vertex.
    pub mesh: usize,
    /// Index of the owning active vertex within that mesh.
    pub vertex: usize,
}

/// A vertex attached to a mesh from outside.
///
/// Passive vertices contribute no lattice forces; they are carried by their
/// enclosing triangle during relaxation and only act on the mesh through
/// the inter-mesh spring that owns them.
#[derive(Debug, Clone)]
pub struct PassiveVertex {
    point: Point,
    owner: PassiveOwner,
    pub(crate) triangle: usize,
    pub(crate) bary: [f64; 3],
}

impl PassiveVertex {
    pub(crate) fn new(point: Point, owner: PassiveOwner, triangle: usize, bary: [f64; 3]) -> Self {
        Self {
            point,
            owner,
            triangle,
            bary,
        }
    }

    /// Rest position of the attached point.
    #[must_use]
    pub fn local(&self) -> Point2<f64> {
        self.point.local
    }

    /// Current carried position.
    #[must_use]
    pub fn world(&self) -> Point2<f64> {
        self.point.world
    }

    /// The owning active match (the `pva` mapping).
    #[must_use]
    pub fn owner(&self) -> PassiveOwner {
        self.owner
    }

    pub(crate) fn set_world(&mut self, world: Point2<f64>) {
        self.point.world = world;
    }

    pub(crate) fn rescale(&mut self, inv_scale: f64, offset: Vector2<f64>) {
        self.point.local = Point2::from(self.point.local.coords * inv_scale + offset);
        self.point.world = Point2::from(self.point.world.coords * inv_scale + offset);
    }
}

/// Reference to a passive vertex held by some mesh of the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassiveRef {
    /// Slot of the mesh owning the passive vertex.
    pub mesh: usize,
    /// Index into that mesh's passive vertex list.
    pub index: usize,
}

/// An inter-mesh spring from an active vertex to a passive vertex on
/// another mesh.
#[derive(Debug, Clone, Copy)]
pub struct Attachment {
    /// The passive endpoint.
    pub target: PassiveRef,
    /// Spring parameters (zero rest length for correspondence springs).
    pub spring: Spring,
    /// Weight of the originating point match.
    pub weight: f64,
}
