//! The deformable spring mesh.

use align_models::{Model, Model2d};
use align_types::{pairwise_mean, ulp, Point};
use nalgebra::{Point2, Vector2};

use crate::vertex::Edge;
use crate::{
    Attachment, MeshError, MeshResult, PassiveOwner, PassiveRef, PassiveVertex, Spring, Vertex,
};

/// Construction parameters for a [`SpringMesh`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshParams {
    /// Number of lattice columns.
    pub resolution: usize,
    /// Covered width in mesh (scaled) units.
    pub width: f64,
    /// Covered height in mesh (scaled) units.
    pub height: f64,
    /// Stiffness of the lattice springs.
    pub stiffness: f64,
    /// Stretch clip of the lattice springs, in mesh units.
    pub max_stretch: f64,
    /// Per-iteration velocity damping, in `(0, 1]`.
    pub damp: f64,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            resolution: 32,
            width: 1.0,
            height: 1.0,
            stiffness: 0.1,
            max_stretch: 2000.0,
            damp: 0.9,
        }
    }
}

impl MeshParams {
    /// Parameters for a mesh covering `width × height`.
    #[must_use]
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    corners: [usize; 3],
    /// Twice the signed rest area; positive by construction.
    rest_doubled_area: f64,
}

/// Per-iteration relaxation statistics of one mesh.
#[derive(Debug, Clone, Copy)]
pub struct MeshStep {
    /// Largest vertex displacement of the iteration.
    pub max_displacement: f64,
    /// Mean force magnitude over the active vertices.
    pub energy: f64,
}

/// A regular triangulated mesh of spring-connected vertices covering a
/// `width × height` rectangle.
///
/// Vertices sit on an equilateral triangular lattice (odd rows offset by
/// half a spacing); springs run along the three lattice directions with a
/// rest length equal to the lattice spacing. External constraints attach
/// through passive vertices carried by the triangulation.
#[derive(Debug, Clone)]
pub struct SpringMesh {
    id: usize,
    columns: usize,
    rows: usize,
    spacing: f64,
    damp: f64,
    vertices: Vec<Vertex>,
    passives: Vec<PassiveVertex>,
    /// Per active vertex: the passive targets attached to it, in attachment
    /// order (the `VA` lists).
    attachments: Vec<Vec<Attachment>>,
    triangles: Vec<Triangle>,
}

impl SpringMesh {
    /// Build the lattice for `params`, identified by `id` (the layer index)
    /// in errors and logs.
    ///
    /// # Errors
    ///
    /// [`MeshError::InvalidParameter`] for non-positive dimensions or a damp
    /// outside `(0, 1]`; [`MeshError::DegenerateLattice`] when fewer than
    /// 2×2 vertices would be created.
    pub fn new(id: usize, params: &MeshParams) -> MeshResult<Self> {
        if !(params.width > 0.0) {
            return Err(MeshError::InvalidParameter {
                name: "width",
                value: params.width,
            });
        }
        if !(params.height > 0.0) {
            return Err(MeshError::InvalidParameter {
                name: "height",
                value: params.height,
            });
        }
        if !(params.damp > 0.0 && params.damp <= 1.0) {
            return Err(MeshError::InvalidParameter {
                name: "damp",
                value: params.damp,
            });
        }

        let columns = params.resolution;
        if columns < 2 {
            return Err(MeshError::DegenerateLattice {
                mesh: id,
                columns,
                rows: 0,
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let spacing = params.width / (columns - 1) as f64;
        let row_height = spacing * 3.0_f64.sqrt() / 2.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rows = ((params.height / row_height).round() as usize + 1).max(2);

        let mut mesh = Self {
            id,
            columns,
            rows,
            spacing,
            damp: params.damp,
            vertices: Vec::with_capacity(columns * rows),
            passives: Vec::new(),
            attachments: vec![Vec::new(); columns * rows],
            triangles: Vec::new(),
        };

        for j in 0..rows {
            #[allow(clippy::cast_precision_loss)]
            let y = j as f64 * row_height;
            let offset = if j % 2 == 1 { spacing / 2.0 } else { 0.0 };
            for i in 0..columns {
                #[allow(clippy::cast_precision_loss)]
                let x = i as f64 * spacing + offset;
                mesh.vertices.push(Vertex::new(Point2::new(x, y)));
            }
        }

        let lattice_spring = Spring::new(spacing, params.stiffness).with_max_stretch(params.max_stretch);
        for j in 0..rows {
            for i in 0..columns {
                let v = mesh.index_of(i, j);
                if i + 1 < columns {
                    mesh.add_spring(v, mesh.index_of(i + 1, j), lattice_spring);
                }
                if j + 1 < rows {
                    if j % 2 == 0 {
                        mesh.add_spring(v, mesh.index_of(i, j + 1), lattice_spring);
                        if i > 0 {
                            mesh.add_spring(v, mesh.index_of(i - 1, j + 1), lattice_spring);
                        }
                    } else {
                        mesh.add_spring(v, mesh.index_of(i, j + 1), lattice_spring);
                        if i + 1 < columns {
                            mesh.add_spring(v, mesh.index_of(i + 1, j + 1), lattice_spring);
                        }
                    }
                }
            }
        }

        for j in 0..rows - 1 {
            for i in 0..columns - 1 {
                let (a, b) = (mesh.index_of(i, j), mesh.index_of(i + 1, j));
                let (c, d) = (mesh.index_of(i, j + 1), mesh.index_of(i + 1, j + 1));
                if j % 2 == 0 {
                    mesh.push_triangle([a, b, c]);
                    mesh.push_triangle([b, d, c]);
                } else {
                    mesh.push_triangle([a, b, d]);
                    mesh.push_triangle([a, d, c]);
                }
            }
        }

        Ok(mesh)
    }

    fn index_of(&self, i: usize, j: usize) -> usize {
        j * self.columns + i
    }

    fn add_spring(&mut self, a: usize, b: usize, spring: Spring) {
        self.vertices[a].add_edge(b, spring);
        self.vertices[b].add_edge(a, spring);
    }

    fn push_triangle(&mut self, corners: [usize; 3]) {
        let area = self.doubled_area_local(corners);
        self.triangles.push(Triangle {
            corners,
            rest_doubled_area: area,
        });
    }

    fn doubled_area_local(&self, [a, b, c]: [usize; 3]) -> f64 {
        let pa = self.vertices[a].local();
        let ab = self.vertices[b].local() - pa;
        let ac = self.vertices[c].local() - pa;
        ab.x * ac.y - ab.y * ac.x
    }

    fn doubled_area_world(&self, [a, b, c]: [usize; 3]) -> f64 {
        let pa = self.vertices[a].world();
        let ab = self.vertices[b].world() - pa;
        let ac = self.vertices[c].world() - pa;
        ab.x * ac.y - ab.y * ac.x
    }

    /// The identifier given at construction (the layer index).
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Active lattice vertices in row-major order.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Passive vertices in attachment order.
    #[must_use]
    pub fn passives(&self) -> &[PassiveVertex] {
        &self.passives
    }

    /// The lattice spacing (spring rest length).
    #[must_use]
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Lattice dimensions as `(columns, rows)`.
    #[must_use]
    pub fn lattice_size(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    /// The `VA` view: for every active vertex, its control match and the
    /// passive targets installed on it, in vertex order.
    pub fn va(&self) -> impl Iterator<Item = (Point, &[Attachment])> + '_ {
        self.vertices
            .iter()
            .zip(self.attachments.iter())
            .map(|(v, a)| (v.point(), a.as_slice()))
    }

    /// The passive targets installed on one active vertex.
    #[must_use]
    pub fn attachments_of(&self, vertex: usize) -> &[Attachment] {
        &self.attachments[vertex]
    }

    /// Find the lattice vertex whose rest position matches `local` to
    /// within `2 ulp` per component.
    #[must_use]
    pub fn find_lattice_vertex(&self, local: Point2<f64>) -> Option<usize> {
        let row_height = self.spacing * 3.0_f64.sqrt() / 2.0;
        #[allow(clippy::cast_possible_truncation)]
        let j = (local.y / row_height).round() as isize;
        if j < 0 || j as usize >= self.rows {
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let j = j as usize;
        let offset = if j % 2 == 1 { self.spacing / 2.0 } else { 0.0 };
        #[allow(clippy::cast_possible_truncation)]
        let i = ((local.x - offset) / self.spacing).round() as isize;
        if i < 0 || i as usize >= self.columns {
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let v = self.index_of(i as usize, j);
        let rest = self.vertices[v].local();
        let close = |a: f64, b: f64| (a - b).abs() <= 2.0 * ulp(b);
        (close(local.x, rest.x) && close(local.y, rest.y)).then_some(v)
    }

    /// Overwrite the world position of an active vertex (a snapped match's
    /// drift wins over the rest position).
    pub fn set_vertex_world(&mut self, vertex: usize, world: Point2<f64>) {
        self.vertices[vertex].set_world(world);
    }

    /// Attach an externally owned point as a passive vertex, carried by the
    /// triangle enclosing its local position (or the nearest boundary
    /// triangle when outside the lattice hull). Returns its index.
    pub fn add_passive_vertex(&mut self, point: Point, owner: PassiveOwner) -> usize {
        let (triangle, bary) = self.locate(point.local);
        self.passives
            .push(PassiveVertex::new(point, owner, triangle, bary));
        self.passives.len() - 1
    }

    /// Install an inter-mesh spring from `source` to a passive vertex on
    /// another mesh.
    pub fn add_attachment(&mut self, source: usize, target: PassiveRef, spring: Spring, weight: f64) {
        self.attachments[source].push(Attachment {
            target,
            spring,
            weight,
        });
    }

    /// Triangle index and (possibly extrapolating) barycentric coordinates
    /// for a local position.
    fn locate(&self, local: Point2<f64>) -> (usize, [f64; 3]) {
        let mut best = (0, [1.0, 0.0, 0.0]);
        let mut best_violation = f64::INFINITY;
        for (t, tri) in self.triangles.iter().enumerate() {
            let bary = self.barycentric(tri, local);
            let violation = -bary.iter().fold(f64::INFINITY, |m, &l| m.min(l));
            if violation <= 1e-9 {
                return (t, bary);
            }
            if violation < best_violation {
                best_violation = violation;
                best = (t, bary);
            }
        }
        best
    }

    fn barycentric(&self, tri: &Triangle, p: Point2<f64>) -> [f64; 3] {
        let [a, b, c] = tri.corners;
        let pa = self.vertices[a].local();
        let ab = self.vertices[b].local() - pa;
        let ac = self.vertices[c].local() - pa;
        let ap = p - pa;
        let den = tri.rest_doubled_area;
        let l1 = (ap.x * ac.y - ap.y * ac.x) / den;
        let l2 = (ab.x * ap.y - ab.y * ap.x) / den;
        [1.0 - l1 - l2, l1, l2]
    }

    /// Warp a local position through the current deformation by barycentric
    /// interpolation.
    #[must_use]
    pub fn warp(&self, local: Point2<f64>) -> Point2<f64> {
        let (t, bary) = self.locate(local);
        self.interpolate(t, bary)
    }

    /// Warp a position in place; see [`SpringMesh::warp`].
    pub fn apply_in_place(&self, p: &mut Point2<f64>) {
        *p = self.warp(*p);
    }

    fn interpolate(&self, triangle: usize, bary: [f64; 3]) -> Point2<f64> {
        let [a, b, c] = self.triangles[triangle].corners;
        let pa = self.vertices[a].world().coords * bary[0];
        let pb = self.vertices[b].world().coords * bary[1];
        let pc = self.vertices[c].world().coords * bary[2];
        Point2::from(pa + pb + pc)
    }

    /// Current world-space bounding box of the active vertices.
    #[must_use]
    pub fn bounds(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in &self.vertices {
            let w = v.world();
            min.x = min.x.min(w.x);
            min.y = min.y.min(w.y);
            max.x = max.x.max(w.x);
            max.y = max.y.max(w.y);
        }
        (min, max)
    }

    /// Seed the mesh near a solved model: every active vertex's world
    /// position becomes the model image of its rest position, and passive
    /// vertices are carried along.
    pub fn init(&mut self, model: &Model) {
        for v in &mut self.vertices {
            let warped = model.apply(v.local());
            v.set_world(warped);
        }
        self.carry_passives();
    }

    /// Divide all coordinates by `scale` and translate by `origin`,
    /// returning the mesh from scaled solve units to world units.
    pub fn unscale(&mut self, scale: f64, origin: Vector2<f64>) {
        let inv = 1.0 / scale;
        for v in &mut self.vertices {
            v.rescale(inv, origin);
        }
        for p in &mut self.passives {
            p.rescale(inv, origin);
        }
    }

    /// Snapshot of the passive vertices' world positions.
    #[must_use]
    pub fn passive_worlds(&self) -> Vec<Point2<f64>> {
        self.passives.iter().map(PassiveVertex::world).collect()
    }

    fn carry_passives(&mut self) {
        for i in 0..self.passives.len() {
            let (t, bary) = (self.passives[i].triangle, self.passives[i].bary);
            let world = self.interpolate(t, bary);
            self.passives[i].set_world(world);
        }
    }

    /// One relaxation step: accumulate spring forces, integrate the active
    /// vertices, then carry the passive vertices.
    ///
    /// `frames[slot]` must hold the passive world positions of the mesh in
    /// `slot` as of the start of the iteration.
    ///
    /// # Errors
    ///
    /// [`MeshError::Collapse`] when a lattice triangle degenerates.
    pub fn update(&mut self, frames: &[Vec<Point2<f64>>]) -> MeshResult<MeshStep> {
        // Forces first, from the positions at the start of the step.
        for v in 0..self.vertices.len() {
            let from = self.vertices[v].world();
            let mut force = Vector2::zeros();
            for &Edge { target, spring } in self.vertices[v].edges() {
                force += spring.force(from, self.vertices[target].world());
            }
            for att in &self.attachments[v] {
                let to = frames[att.target.mesh][att.target.index];
                force += att.spring.force(from, to);
            }
            self.vertices[v].set_force(force);
        }

        // Integrate.
        let mut max_displacement = 0.0_f64;
        let mut energies = Vec::with_capacity(self.vertices.len());
        for v in 0..self.vertices.len() {
            let incident = self.vertices[v].degree() + self.attachments[v].len();
            let force = self.vertices[v].force_vector();
            energies.push(force.norm());
            if incident == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let delta = force * (self.damp / incident as f64);
            max_displacement = max_displacement.max(delta.norm());
            let world = self.vertices[v].world() + delta;
            self.vertices[v].set_world(world);
        }

        self.carry_passives();

        for (t, tri) in self.triangles.iter().enumerate() {
            let area = self.doubled_area_world(tri.corners);
            if !area.is_finite()
                || area.abs() < tri.rest_doubled_area.abs() * 1e-9
                || area.signum() != tri.rest_doubled_area.signum()
            {
                return Err(MeshError::Collapse {
                    mesh: self.id,
                    triangle: t,
                });
            }
        }

        Ok(MeshStep {
            max_displacement,
            energy: pairwise_mean(&energies),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mesh(width: f64, height: f64, resolution: usize) -> SpringMesh {
        SpringMesh::new(
            0,
            &MeshParams {
                resolution,
                width,
                height,
                ..MeshParams::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn lattice_covers_requested_rectangle() {
        let m = mesh(100.0, 50.0, 11);
        let (columns, rows) = m.lattice_size();
        assert_eq!(columns, 11);
        assert!(rows >= 2);
        assert_relative_eq!(m.spacing(), 10.0, epsilon = 1e-12);
        let (min, max) = m.bounds();
        assert_relative_eq!(min.x, 0.0, epsilon = 1e-12);
        assert!(max.x >= 100.0);
        assert!(max.y >= 50.0 - m.spacing());
    }

    #[test]
    fn springs_rest_at_lattice_spacing() {
        let m = mesh(30.0, 30.0, 4);
        for v in m.vertices() {
            assert!(v.degree() >= 2);
        }
        // At rest, a relaxation step moves nothing.
        let mut m = m;
        let step = m.update(&[Vec::new()]).unwrap();
        assert_relative_eq!(step.max_displacement, 0.0, epsilon = 1e-12);
        assert_relative_eq!(step.energy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_lattice_is_rejected() {
        let r = SpringMesh::new(
            3,
            &MeshParams {
                resolution: 1,
                ..MeshParams::default()
            },
        );
        assert!(matches!(r, Err(MeshError::DegenerateLattice { mesh: 3, .. })));
    }

    #[test]
    fn bad_damp_is_rejected() {
        let r = SpringMesh::new(
            0,
            &MeshParams {
                damp: 0.0,
                ..MeshParams::default()
            },
        );
        assert!(matches!(
            r,
            Err(MeshError::InvalidParameter { name: "damp", .. })
        ));
    }

    #[test]
    fn find_lattice_vertex_snaps_exact_positions() {
        let m = mesh(40.0, 40.0, 5);
        for (i, v) in m.vertices().iter().enumerate() {
            assert_eq!(m.find_lattice_vertex(v.local()), Some(i));
        }
        assert_eq!(m.find_lattice_vertex(Point2::new(3.3, 4.4)), None);
        assert_eq!(m.find_lattice_vertex(Point2::new(-100.0, 0.0)), None);
    }

    #[test]
    fn warp_is_identity_at_rest() {
        let m = mesh(20.0, 20.0, 5);
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(7.3, 6.1),
            Point2::new(19.0, 18.0),
        ] {
            let w = m.warp(p);
            assert_relative_eq!(w.x, p.x, epsilon = 1e-9);
            assert_relative_eq!(w.y, p.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn warp_follows_a_uniform_translation() {
        let mut m = mesh(20.0, 20.0, 5);
        for v in 0..m.vertices().len() {
            let w = m.vertices()[v].world() + Vector2::new(3.0, -2.0);
            m.set_vertex_world(v, w);
        }
        let w = m.warp(Point2::new(5.0, 5.0));
        assert_relative_eq!(w.x, 8.0, epsilon = 1e-9);
        assert_relative_eq!(w.y, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn passive_vertex_is_carried_by_its_triangle() {
        let mut m = mesh(20.0, 20.0, 5);
        let owner = PassiveOwner { mesh: 9, vertex: 0 };
        let idx = m.add_passive_vertex(Point::new(Point2::new(6.0, 6.0)), owner);
        assert_eq!(m.passives()[idx].owner(), owner);

        for v in 0..m.vertices().len() {
            let w = m.vertices()[v].world() + Vector2::new(1.0, 1.0);
            m.set_vertex_world(v, w);
        }
        let _ = m.update(&[Vec::new()]).unwrap();
        let w = m.passives()[idx].world();
        assert_relative_eq!(w.x, 7.0, epsilon = 1e-6);
        assert_relative_eq!(w.y, 7.0, epsilon = 1e-6);
    }

    #[test]
    fn outside_point_snaps_to_nearest_triangle() {
        let m = mesh(20.0, 20.0, 5);
        // Far outside the hull: extrapolation through the nearest triangle
        // still reproduces the identity at rest.
        let p = Point2::new(-5.0, -5.0);
        let w = m.warp(p);
        assert_relative_eq!(w.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(w.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn collapse_is_detected() {
        let mut m = mesh(20.0, 20.0, 3);
        // Fold a corner of the first triangle far across its opposite
        // edge; one integration step cannot recover the orientation.
        let c = m.lattice_size().0;
        m.set_vertex_world(c, Point2::new(0.0, -100.0));
        let err = m.update(&[Vec::new()]).unwrap_err();
        assert!(matches!(err, MeshError::Collapse { mesh: 0, .. }));
    }

    #[test]
    fn unscale_moves_both_coordinate_sets() {
        let mut m = mesh(10.0, 10.0, 3);
        m.unscale(0.1, Vector2::new(100.0, 200.0));
        let v = &m.vertices()[0];
        assert_relative_eq!(v.local().x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(v.local().y, 200.0, epsilon = 1e-9);
        assert_relative_eq!(v.world().x, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn unscale_is_an_involution() {
        use align_types::ulp;
        let original = mesh(10.0, 10.0, 4);
        let mut m = original.clone();
        let scale = 0.1;
        let origin = Vector2::new(17.0, -3.0);
        m.unscale(scale, origin);
        // Manually re-apply the forward scaling and compare.
        for (a, b) in m.vertices().iter().zip(original.vertices().iter()) {
            let back = (a.local() - origin) * scale;
            let expected = b.local().coords;
            assert!((back.x - expected.x).abs() <= 4.0 * ulp(expected.x.max(1.0)));
            assert!((back.y - expected.y).abs() <= 4.0 * ulp(expected.y.max(1.0)));
        }
    }

    #[test]
    fn attachment_pulls_vertex_toward_passive_target() {
        let mut m = mesh(20.0, 20.0, 5);
        let target = PassiveRef { mesh: 1, index: 0 };
        m.add_attachment(0, target, Spring::new(0.0, 1.0), 1.0);
        let frames = vec![Vec::new(), vec![Point2::new(5.0, 0.0)]];
        let before = m.vertices()[0].world();
        let step = m.update(&frames).unwrap();
        let after = m.vertices()[0].world();
        assert!(after.x > before.x);
        assert!(step.energy > 0.0);
    }
}
