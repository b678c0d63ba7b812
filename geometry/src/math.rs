//! Coordinate types and the image bounding-box ray intersection shared by
//! every projector kernel.
//!
//! This is a direct generalization of the voxel-box entry/exit calculation
//! used by the original Siddon traversal: the box is expressed as a
//! `ncollide3d` `Cuboid` centred on the origin, and a LOR is cast against it
//! as a `Ray`. The Joseph kernel only needs the two scalar parameters
//! (entry/exit) of that intersection, not the full voxel-by-voxel walk.

use ncollide3d as nc;
use nc::query::RayCast;

pub type Length = f32;

pub type Point = nc::math::Point<Length>;
pub type Vector = nc::math::Vector<Length>;
type Ray = nc::query::Ray<Length>;
type Isometry = nc::math::Isometry<Length>;

/// Axis-aligned image bounding box, centred on `img_origin + half_extent`.
///
/// `half_extent[a] = n[a] * voxsize[a] / 2`, and the box's local frame has
/// voxel `(0,0,0)`'s corner (not its centre) at the origin of the
/// `Cuboid`'s own coordinate system; callers translate world points into
/// this frame before calling [`BBox::intersect`].
#[derive(Clone, Copy, Debug)]
pub struct BBox {
    pub half_extent: Vector,
}

impl BBox {
    pub fn new(half_extent: Vector) -> Self {
        Self { half_extent }
    }

    /// Signed distances (in world units, along the direction `p2 - p1`) of
    /// the entry and exit points of the segment `p1 -> p2` with this box.
    /// Returns `None` when the segment misses the box entirely.
    pub fn intersect(&self, p1: Point, p2: Point) -> Option<(Length, Length)> {
        let dir = p2 - p1;
        let len = dir.norm();
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        let unit = dir / len;
        let cuboid = nc::shape::Cuboid::new(self.half_extent);
        let iso = Isometry::identity();

        let entry_fwd = Ray::new(p1, unit);
        let t_entry = cuboid.toi_with_ray(&iso, &entry_fwd, len, true);

        let entry_bwd = Ray::new(p2, -unit);
        let t_exit = cuboid.toi_with_ray(&iso, &entry_bwd, len, true).map(|t| len - t);

        match (t_entry, t_exit) {
            (Some(a), Some(b)) if a <= b => Some((a, b)),
            // A ray whose origin is already inside the box reports toi = 0
            // from both directions; treat that degenerate case as a miss
            // only when the two intersections disagree about ordering.
            (Some(a), Some(b)) => Some((b, a)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::through_centre_axis0([-10.0, 0.0, 0.0], [10.0, 0.0, 0.0], 5.0, 15.0)]
    #[case::through_centre_axis1([0.0, -10.0, 0.0], [0.0, 10.0, 0.0], 5.0, 15.0)]
    #[case::oblique_diagonal([-10.0, -10.0, -10.0], [10.0, 10.0, 10.0], 8.660254, 25.98076)]
    fn intersect_hits_expected_entry_and_exit(
        #[case] p1: [Length; 3],
        #[case] p2: [Length; 3],
        #[case] expected_entry: Length,
        #[case] expected_exit: Length,
    ) {
        let bbox = BBox::new(Vector::new(5.0, 5.0, 5.0));
        let (entry, exit) = bbox
            .intersect(Point::new(p1[0], p1[1], p1[2]), Point::new(p2[0], p2[1], p2[2]))
            .expect("segment must hit the box");
        assert_float_eq!(entry, expected_entry, abs <= 1e-4);
        assert_float_eq!(exit, expected_exit, abs <= 1e-4);
    }

    #[test]
    fn intersect_misses_box_entirely() {
        let bbox = BBox::new(Vector::new(5.0, 5.0, 5.0));
        let p1 = Point::new(100.0, 100.0, 0.0);
        let p2 = Point::new(-100.0, 100.0, 0.0);
        assert!(bbox.intersect(p1, p2).is_none());
    }

    #[test]
    fn intersect_degenerate_segment_misses() {
        let bbox = BBox::new(Vector::new(5.0, 5.0, 5.0));
        let p = Point::new(0.0, 0.0, 0.0);
        assert!(bbox.intersect(p, p).is_none());
    }
}
