//! Exact 3D convex hulls
//!
//! Quickhull: start from a maximal tetrahedron and give every face the list
//! of points outside it. Each step takes the farthest point of one list,
//! removes the faces it can see and stitches the horizon to it, then hands
//! the orphaned points to the new faces. Near ties go to the point farthest
//! from the face centre so only extreme points become vertices. Faces are
//! wound counter-clockwise seen from outside.

use glam::Vec3;
use hashbrown::HashSet;

use crate::error::GeometryError;
use crate::math::Bounds;

/// Distance tolerance relative to the point cloud's extent
const RELATIVE_EPSILON: f32 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct ConvexHull {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

struct Face {
    indices: [u32; 3],
    normal: Vec3,
    offset: f32,
    centroid: Vec3,
    alive: bool,
    /// Points outside this face and no other face claimed first
    outside: Vec<u32>,
}

impl Face {
    fn new(points: &[Vec3], indices: [u32; 3]) -> Self {
        let [a, b, c] = indices.map(|i| points[i as usize]);
        let normal = (b - a).cross(c - a).normalize_or_zero();
        Self {
            indices,
            normal,
            offset: normal.dot(a),
            centroid: (a + b + c) / 3.0,
            alive: true,
            outside: Vec::new(),
        }
    }

    #[inline]
    fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.offset
    }
}

impl ConvexHull {
    /// Compute the convex hull of `points`.
    ///
    /// Fails on fewer than four points or when the points span no volume.
    /// Output vertices are a subset of the input points; points lying on a
    /// face or edge of the hull are not kept as vertices.
    pub fn try_new(points: &[Vec3]) -> Result<Self, GeometryError> {
        if points.len() < 4 {
            return Err(GeometryError::TooFewPoints(points.len()));
        }

        let bounds = Bounds::from_points(points);
        let epsilon = bounds.size().max_element().max(1.0) * RELATIVE_EPSILON;

        let seed = initial_tetrahedron(points, epsilon)?;
        let center = seed.iter().map(|&i| points[i]).sum::<Vec3>() * 0.25;

        let mut faces: Vec<Face> = [[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]]
            .into_iter()
            .map(|[a, b, c]| {
                let mut indices = [seed[a] as u32, seed[b] as u32, seed[c] as u32];
                let face = Face::new(points, indices);
                if face.distance(center) > 0.0 {
                    indices.swap(1, 2);
                }
                Face::new(points, indices)
            })
            .collect();

        let rest = (0..points.len())
            .filter(|i| !seed.contains(i))
            .map(|i| i as u32);
        assign_outside(points, &mut faces, rest, epsilon);

        let mut edges: HashSet<(u32, u32)> = HashSet::new();

        while let Some(current) = faces
            .iter()
            .position(|face| face.alive && !face.outside.is_empty())
        {
            let face = &faces[current];
            let candidates = face.outside.iter().map(|&i| {
                let point = points[i as usize];
                (
                    face.distance(point),
                    point.distance_squared(face.centroid),
                    i as usize,
                )
            });
            let Some((_, apex)) = farthest(candidates, epsilon) else {
                break;
            };
            let point = points[apex];

            let visible: Vec<usize> = faces
                .iter()
                .enumerate()
                .filter(|(_, face)| face.alive && face.distance(point) > epsilon)
                .map(|(i, _)| i)
                .collect();

            // Horizon: directed edges of visible faces whose twin is not visible
            edges.clear();
            for &f in &visible {
                let [a, b, c] = faces[f].indices;
                edges.extend([(a, b), (b, c), (c, a)]);
            }
            let horizon: Vec<(u32, u32)> = edges
                .iter()
                .copied()
                .filter(|&(a, b)| !edges.contains(&(b, a)))
                .collect();

            let mut orphans = Vec::new();
            for &f in &visible {
                let face = &mut faces[f];
                face.alive = false;
                orphans.extend(face.outside.drain(..).filter(|&i| i as usize != apex));
            }

            let first_new = faces.len();
            let apex = apex as u32;
            faces.extend(horizon.into_iter().map(|(a, b)| Face::new(points, [a, b, apex])));
            assign_outside(points, &mut faces[first_new..], orphans, epsilon);
        }

        let live = faces.iter().filter(|face| face.alive).map(|face| face.indices);
        Ok(Self::compact(points, live))
    }

    /// Keep only referenced points and renumber faces.
    fn compact(points: &[Vec3], faces: impl Iterator<Item = [u32; 3]>) -> Self {
        let mut remap = vec![u32::MAX; points.len()];
        let mut vertices = Vec::new();
        let faces = faces
            .map(|face| {
                face.map(|i| {
                    let slot = &mut remap[i as usize];
                    if *slot == u32::MAX {
                        *slot = vertices.len() as u32;
                        vertices.push(points[i as usize]);
                    }
                    *slot
                })
            })
            .collect();
        Self { vertices, faces }
    }

    /// Axis-aligned box around `points` as 8 corners and 12 outward triangles.
    pub fn aabb_box(points: &[Vec3]) -> Result<Self, GeometryError> {
        if points.is_empty() {
            return Err(GeometryError::TooFewPoints(0));
        }
        let Bounds { min, max } = Bounds::from_points(points);

        let vertices = vec![
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        Ok(Self { vertices, faces })
    }

    /// True if `point` is inside or within `tolerance` of every face plane.
    pub fn contains(&self, point: Vec3, tolerance: f32) -> bool {
        self.triangles().all(|[a, b, c]| {
            let normal = (b - a).cross(c - a).normalize_or_zero();
            normal.dot(point - a) <= tolerance
        })
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.faces
            .iter()
            .map(|face| face.map(|i| self.vertices[i as usize]))
    }

    /// Unit normal of face `index`.
    pub fn face_normal(&self, index: usize) -> Vec3 {
        let [a, b, c] = self.faces[index].map(|i| self.vertices[i as usize]);
        (b - a).cross(c - a).normalize_or_zero()
    }

    pub fn volume(&self) -> f32 {
        self.triangles()
            .map(|[a, b, c]| a.dot(b.cross(c)))
            .sum::<f32>()
            / 6.0
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.vertices)
    }
}

/// Indices of four points spanning the largest volume found greedily.
///
/// Every pick is an extreme point of the cloud, so the seed never has to be
/// removed again.
fn initial_tetrahedron(points: &[Vec3], epsilon: f32) -> Result<[usize; 4], GeometryError> {
    // Lexicographic extremes per axis, which are always hull vertices
    let mut extremes = [0usize; 6];
    for axis in 0..3 {
        let key = |p: Vec3| [p[axis], p[(axis + 1) % 3], p[(axis + 2) % 3]];
        for (i, &p) in points.iter().enumerate() {
            if key(p) < key(points[extremes[axis * 2]]) {
                extremes[axis * 2] = i;
            }
            if key(p) > key(points[extremes[axis * 2 + 1]]) {
                extremes[axis * 2 + 1] = i;
            }
        }
    }
    let mut best = (0.0, 0, 0);
    for &i in &extremes {
        for &j in &extremes {
            let d = points[i].distance_squared(points[j]);
            if d > best.0 {
                best = (d, i, j);
            }
        }
    }
    let (d, p0, p1) = best;
    if d.sqrt() <= epsilon {
        return Err(GeometryError::Coincident);
    }
    let origin = points[p0];

    // Farthest from the line p0-p1
    let dir = (points[p1] - origin).normalize();
    let (_, p2) = farthest(
        points.iter().enumerate().map(|(i, &p)| {
            ((p - origin).cross(dir).length(), p.distance_squared(origin), i)
        }),
        epsilon,
    )
    .filter(|&(d, _)| d > epsilon)
    .ok_or(GeometryError::Collinear)?;

    // Farthest from the plane p0-p1-p2
    let normal = (points[p1] - origin).cross(points[p2] - origin).normalize();
    let (_, p3) = farthest(
        points.iter().enumerate().map(|(i, &p)| {
            (normal.dot(p - origin).abs(), p.distance_squared(origin), i)
        }),
        epsilon,
    )
    .filter(|&(d, _)| d > epsilon)
    .ok_or(GeometryError::Coplanar)?;

    Ok([p0, p1, p2, p3])
}

/// Hand each point to the face it lies farthest outside of, dropping points
/// outside none of them.
fn assign_outside(
    points: &[Vec3],
    faces: &mut [Face],
    candidates: impl IntoIterator<Item = u32>,
    epsilon: f32,
) {
    for i in candidates {
        let point = points[i as usize];
        let owner = faces
            .iter()
            .enumerate()
            .map(|(f, face)| (face.distance(point), f))
            .filter(|&(d, _)| d > epsilon)
            .max_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, f)) = owner {
            faces[f].outside.push(i);
        }
    }
}

/// Candidate `(distance, tie_break, index)` with the largest distance. Within
/// `epsilon` of the best, the larger tie-break wins.
fn farthest(
    candidates: impl Iterator<Item = (f32, f32, usize)>,
    epsilon: f32,
) -> Option<(f32, usize)> {
    candidates
        .fold(None, |best: Option<(f32, f32, usize)>, next| match best {
            Some(best)
                if next.0 <= best.0 + epsilon
                    && ((next.0 - best.0).abs() > epsilon || next.1 <= best.1) =>
            {
                Some(best)
            }
            _ => Some(next),
        })
        .map(|(distance, _, index)| (distance, index))
}
