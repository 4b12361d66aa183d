//! Convex hull measures used for flash extent.

use geo::{Area, ConvexHull, MultiPoint, Point};
use nalgebra::Vector3;
use std::collections::HashSet;

/// Relative tolerance for treating points as coplanar.
const PLANAR_TOLERANCE: f64 = 1e-9;

/// Area of the 2-D convex hull. Fewer than three points, or collinear
/// points, give zero.
pub fn hull_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let cloud: MultiPoint<f64> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
    cloud.convex_hull().unsigned_area()
}

/// Volume of the 3-D convex hull, built incrementally. Fewer than four
/// points, or coplanar points, give zero.
pub fn hull_volume(points: &[(f64, f64, f64)]) -> f64 {
    if points.len() < 4 {
        return 0.0;
    }
    let pts: Vec<Vector3<f64>> = points
        .iter()
        .map(|&(x, y, z)| Vector3::new(x, y, z))
        .collect();
    let Some(seed) = initial_tetrahedron(&pts) else {
        return 0.0;
    };

    let scale = extent(&pts);
    let eps = PLANAR_TOLERANCE * scale;
    let interior = (pts[seed[0]] + pts[seed[1]] + pts[seed[2]] + pts[seed[3]]) / 4.0;

    let mut faces: Vec<[usize; 3]> = Vec::new();
    for (a, b, c) in [
        (seed[0], seed[1], seed[2]),
        (seed[0], seed[1], seed[3]),
        (seed[0], seed[2], seed[3]),
        (seed[1], seed[2], seed[3]),
    ] {
        faces.push(outward(&pts, interior, [a, b, c]));
    }

    for idx in 0..pts.len() {
        if seed.contains(&idx) {
            continue;
        }
        let point = pts[idx];
        let visible: Vec<bool> = faces
            .iter()
            .map(|face| signed_distance(&pts, face, point) > eps)
            .collect();
        if !visible.iter().any(|&v| v) {
            continue;
        }

        let visible_edges: HashSet<(usize, usize)> = faces
            .iter()
            .zip(&visible)
            .filter(|(_, is_visible)| **is_visible)
            .flat_map(|(face, _)| edges(face))
            .collect();

        let mut next: Vec<[usize; 3]> = Vec::with_capacity(faces.len() + 4);
        let mut horizon: Vec<(usize, usize)> = Vec::new();
        for (face, &is_visible) in faces.iter().zip(&visible) {
            if is_visible {
                horizon.extend(
                    edges(face)
                        .into_iter()
                        .filter(|&(a, b)| !visible_edges.contains(&(b, a))),
                );
            } else {
                next.push(*face);
            }
        }
        next.extend(horizon.into_iter().map(|(a, b)| [a, b, idx]));
        faces = next;
    }

    faces
        .iter()
        .map(|&[a, b, c]| {
            (pts[a] - interior)
                .dot(&(pts[b] - interior).cross(&(pts[c] - interior)))
                / 6.0
        })
        .sum::<f64>()
        .abs()
}

fn edges(face: &[usize; 3]) -> [(usize, usize); 3] {
    [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])]
}

fn normal(pts: &[Vector3<f64>], face: &[usize; 3]) -> Vector3<f64> {
    (pts[face[1]] - pts[face[0]]).cross(&(pts[face[2]] - pts[face[0]]))
}

fn signed_distance(pts: &[Vector3<f64>], face: &[usize; 3], point: Vector3<f64>) -> f64 {
    let n = normal(pts, face);
    let len = n.norm();
    if len == 0.0 {
        return 0.0;
    }
    n.dot(&(point - pts[face[0]])) / len
}

fn outward(pts: &[Vector3<f64>], interior: Vector3<f64>, face: [usize; 3]) -> [usize; 3] {
    if signed_distance(pts, &face, interior) > 0.0 {
        [face[0], face[2], face[1]]
    } else {
        face
    }
}

fn extent(pts: &[Vector3<f64>]) -> f64 {
    let mut lo = pts[0];
    let mut hi = pts[0];
    for p in pts {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    (hi - lo).norm()
}

/// Four affinely independent points, chosen from extremes for stability.
fn initial_tetrahedron(pts: &[Vector3<f64>]) -> Option<[usize; 4]> {
    let scale = extent(pts);
    if scale == 0.0 {
        return None;
    }
    let eps = PLANAR_TOLERANCE * scale;

    let i0 = (0..pts.len()).min_by(|&a, &b| pts[a].x.total_cmp(&pts[b].x))?;
    let i1 = farthest(pts, |p| (p - pts[i0]).norm())?;
    let axis = pts[i1] - pts[i0];
    if axis.norm() <= eps {
        return None;
    }
    let axis_unit = axis.normalize();
    let i2 = farthest(pts, |p| (p - pts[i0]).cross(&axis_unit).norm())?;
    if (pts[i2] - pts[i0]).cross(&axis_unit).norm() <= eps {
        return None;
    }
    let plane = axis.cross(&(pts[i2] - pts[i0])).normalize();
    let i3 = farthest(pts, |p| plane.dot(&(p - pts[i0])).abs())?;
    if plane.dot(&(pts[i3] - pts[i0])).abs() <= eps {
        return None;
    }
    Some([i0, i1, i2, i3])
}

fn farthest(pts: &[Vector3<f64>], metric: impl Fn(&Vector3<f64>) -> f64) -> Option<usize> {
    (0..pts.len()).max_by(|&a, &b| metric(&pts[a]).total_cmp(&metric(&pts[b])))
}
