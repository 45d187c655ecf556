//! Point-to-surface distance.
//!
//! [`DistanceField`] is the query interface the deviation evaluator needs;
//! [`TriangleDistanceField`] answers it exactly by closest-point search over
//! the triangles of a mesh, culling triangles whose bounding box is already
//! farther than the best candidate.

use nalgebra::{Point3, Vector3};

use crate::error::{OvoidError, Result};
use crate::mesh::TriMesh;

/// Signed distance to a surface.
pub trait DistanceField: Sync {
    /// Signed distance from `point` to the surface: positive on the side the
    /// closest face normal points to.
    fn signed_distance(&self, point: &Point3<f64>) -> f64;

    /// Unsigned distance from `point` to the surface.
    fn distance(&self, point: &Point3<f64>) -> f64 {
        self.signed_distance(point).abs()
    }
}

/// Result of a closest-point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    /// Closest point on the surface.
    pub point: Point3<f64>,
    /// Triangle containing it.
    pub face: usize,
    /// Squared distance to the query point.
    pub distance_squared: f64,
}

#[derive(Debug, Clone)]
struct Triangle {
    corners: [Point3<f64>; 3],
    normal: Vector3<f64>,
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Triangle {
    /// Squared distance from `p` to the bounding box; a lower bound for the
    /// distance to the triangle.
    #[inline]
    fn box_distance_squared(&self, p: &Point3<f64>) -> f64 {
        let clamped = p.sup(&self.min).inf(&self.max);
        (p - clamped).norm_squared()
    }
}

/// Exact distance field of a triangle mesh.
#[derive(Debug, Clone)]
pub struct TriangleDistanceField {
    triangles: Vec<Triangle>,
}

impl TriangleDistanceField {
    /// Precompute triangles, normals and bounds of `surface`.
    ///
    /// Returns [`OvoidError::EmptyMesh`] if the surface has no faces.
    pub fn new(surface: &TriMesh) -> Result<Self> {
        if surface.num_faces() == 0 {
            return Err(OvoidError::EmptyMesh);
        }

        let triangles = (0..surface.num_faces())
            .map(|f| {
                let corners = surface.face_positions(f);
                let [a, b, c] = corners;
                Triangle {
                    corners,
                    normal: surface.face_normal(f),
                    min: a.inf(&b).inf(&c),
                    max: a.sup(&b).sup(&c),
                }
            })
            .collect();

        Ok(Self { triangles })
    }

    /// Number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Closest point on the surface to `point`.
    pub fn closest_point(&self, point: &Point3<f64>) -> ClosestPoint {
        let mut best = ClosestPoint {
            point: self.triangles[0].corners[0],
            face: 0,
            distance_squared: f64::INFINITY,
        };

        for (face, tri) in self.triangles.iter().enumerate() {
            if tri.box_distance_squared(point) >= best.distance_squared {
                continue;
            }
            let [a, b, c] = tri.corners;
            let q = closest_point_on_triangle(point, &a, &b, &c);
            let d2 = (point - q).norm_squared();
            if d2 < best.distance_squared {
                best = ClosestPoint {
                    point: q,
                    face,
                    distance_squared: d2,
                };
            }
        }

        best
    }
}

impl DistanceField for TriangleDistanceField {
    fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        let closest = self.closest_point(point);
        let distance = closest.distance_squared.sqrt();
        let side = (point - closest.point).dot(&self.triangles[closest.face].normal);
        if side < 0.0 {
            -distance
        } else {
            distance
        }
    }

    fn distance(&self, point: &Point3<f64>) -> f64 {
        self.closest_point(point).distance_squared.sqrt()
    }
}

/// Closest point to `p` on triangle `abc`.
///
/// Voronoi-region classification from Ericson, "Real-Time Collision
/// Detection" (2005), section 5.1.5.
pub fn closest_point_on_triangle(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Point3<f64> {
    let ab = b - a;
    let ac = c - a;

    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && d4 >= d3 && d5 >= d6 {
        let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * t;
    }

    let denom = va + vb + vc;
    if denom.abs() < f64::MIN_POSITIVE {
        // Collinear corners that slipped past every region test.
        return *a;
    }
    a + ab * (vb / denom) + ac * (vc / denom)
}
