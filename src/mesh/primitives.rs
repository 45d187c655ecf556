//! Reference surfaces.
//!
//! Closed, outward-wound meshes with known geometry: the regular icosahedron,
//! geodesic icospheres built by midpoint subdivision, and latitude/longitude
//! ellipsoids. Used for ellipsoid tessellation, tests and benchmarks.

use std::collections::HashMap;
use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};

use crate::mesh::topology::edge_key;
use crate::mesh::TriMesh;

/// Regular icosahedron with circumradius `radius`, centered at the origin.
pub fn icosahedron(radius: f64) -> TriMesh {
    let (vertices, faces) = icosahedron_parts(radius);
    TriMesh::new_unchecked(vertices, faces)
}

/// Geodesic sphere: an icosahedron subdivided `subdivisions` times, every new
/// vertex projected onto the sphere of `radius`.
///
/// Vertex count is `10 * 4^s + 2`.
pub fn icosphere(subdivisions: usize, radius: f64) -> TriMesh {
    let (mut vertices, mut faces) = icosahedron_parts(radius);

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut next_faces = Vec::with_capacity(faces.len() * 4);

        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Point3<f64>>| -> usize {
            *midpoints.entry(edge_key(a, b)).or_insert_with(|| {
                let mid = (vertices[a].coords + vertices[b].coords) * 0.5;
                vertices.push(Point3::from(mid.normalize() * radius));
                vertices.len() - 1
            })
        };

        for &[a, b, c] in &faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);

            next_faces.push([a, ab, ca]);
            next_faces.push([b, bc, ab]);
            next_faces.push([c, ca, bc]);
            next_faces.push([ab, bc, ca]);
        }

        faces = next_faces;
    }

    TriMesh::new_unchecked(vertices, faces)
}

/// Latitude/longitude tessellation of the axis-aligned ellipsoid with
/// semi-axes `radii`, centered at the origin.
///
/// The surface is `(a·sin v·cos u, b·sin v·sin u, c·cos v)` sampled at
/// `u_res` longitudes and `v_res` latitude bands. Poles are single vertices,
/// so the result is closed: `u_res * (v_res - 1) + 2` vertices and
/// `2 * u_res * (v_res - 1)` faces. Both resolutions are raised to at least 3.
pub fn uv_ellipsoid(radii: &Vector3<f64>, u_res: usize, v_res: usize) -> TriMesh {
    let u_res = u_res.max(3);
    let v_res = v_res.max(3);

    let point = |u: f64, v: f64| {
        Point3::new(
            radii.x * v.sin() * u.cos(),
            radii.y * v.sin() * u.sin(),
            radii.z * v.cos(),
        )
    };

    let mut vertices = Vec::with_capacity(u_res * (v_res - 1) + 2);
    vertices.push(Point3::new(0.0, 0.0, radii.z));
    for j in 1..v_res {
        let v = PI * j as f64 / v_res as f64;
        for i in 0..u_res {
            let u = 2.0 * PI * i as f64 / u_res as f64;
            vertices.push(point(u, v));
        }
    }
    vertices.push(Point3::new(0.0, 0.0, -radii.z));

    let north = 0;
    let south = vertices.len() - 1;
    let ring = |j: usize, i: usize| 1 + (j - 1) * u_res + (i % u_res);

    let mut faces = Vec::with_capacity(2 * u_res * (v_res - 1));
    for i in 0..u_res {
        faces.push([north, ring(1, i), ring(1, i + 1)]);
    }
    for j in 1..(v_res - 1) {
        for i in 0..u_res {
            let a = ring(j, i);
            let b = ring(j + 1, i);
            let c = ring(j + 1, i + 1);
            let d = ring(j, i + 1);
            faces.push([a, b, d]);
            faces.push([d, b, c]);
        }
    }
    for i in 0..u_res {
        faces.push([ring(v_res - 1, i), south, ring(v_res - 1, i + 1)]);
    }

    TriMesh::new_unchecked(vertices, faces)
}

fn icosahedron_parts(radius: f64) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let raw = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ];
    let vertices = raw
        .iter()
        .map(|&[x, y, z]| Point3::from(Vector3::new(x, y, z).normalize() * radius))
        .collect();

    let faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    (vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::EdgeTopology;

    #[test]
    fn test_icosahedron_outward() {
        let mesh = icosahedron(1.0);
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.num_faces(), 20);
        assert!(mesh.signed_volume() > 0.0);
        for f in 0..mesh.num_faces() {
            let outward = mesh.face_barycenter(f).coords;
            assert!(mesh.face_normal(f).dot(&outward) > 0.0, "face {} inward", f);
        }
    }

    #[test]
    fn test_icosphere_counts_and_radius() {
        let mesh = icosphere(2, 2.0);
        assert_eq!(mesh.num_vertices(), 162);
        assert_eq!(mesh.num_faces(), 320);
        assert!(EdgeTopology::new(&mesh).is_closed_manifold());
        for p in mesh.positions() {
            assert!((p.coords.norm() - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_icosphere_volume_approaches_sphere() {
        let mesh = icosphere(4, 1.0);
        let sphere = 4.0 / 3.0 * PI;
        assert!(mesh.signed_volume() > 0.0);
        assert!((mesh.signed_volume() - sphere).abs() / sphere < 0.01);
    }

    #[test]
    fn test_uv_ellipsoid_closed_and_outward() {
        let radii = Vector3::new(3.0, 2.0, 1.0);
        let mesh = uv_ellipsoid(&radii, 30, 30);
        assert_eq!(mesh.num_vertices(), 30 * 29 + 2);
        assert_eq!(mesh.num_faces(), 2 * 30 * 29);
        assert!(EdgeTopology::new(&mesh).is_closed_manifold());

        let exact = 4.0 / 3.0 * PI * 6.0;
        let volume = mesh.signed_volume();
        assert!(volume > 0.0);
        assert!(volume < exact);
        assert!((exact - volume) / exact < 0.03);
    }

    #[test]
    fn test_uv_ellipsoid_clamps_resolution() {
        let mesh = uv_ellipsoid(&Vector3::new(1.0, 1.0, 1.0), 1, 0);
        assert_eq!(mesh.num_vertices(), 3 * 2 + 2);
        assert!(mesh.signed_volume() > 0.0);
    }
}
