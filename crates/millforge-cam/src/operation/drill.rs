//! Drilling at hole centres.

use millforge_math::{Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Layer, Segment, SegmentKind, StrategyInput, StrategyOutput};
use crate::error::{CamError, Result};
use crate::geometry::Geometry;

/// Drill operation. Holes are taken from a boundary's hole loops, the outer
/// loop when there are none, or a point set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drill {}

impl Drill {
    /// One single-point segment per hole at the full depth.
    pub fn generate(&self, input: &StrategyInput<'_>) -> Result<StrategyOutput> {
        let depth = input.settings.depth;
        if !depth.is_finite() || depth <= 0.0 {
            return Err(CamError::InvalidParameter {
                name: "depth",
                value: depth,
                reason: "must be positive",
            });
        }

        let points: Vec<Point2> = match input.geometry {
            Geometry::Boundary(_) => {
                let b = input.boundary()?;
                if b.holes().is_empty() {
                    vec![b.outer().centroid()]
                } else {
                    b.holes().iter().map(|h| h.centroid()).collect()
                }
            }
            Geometry::Points { points } => points.clone(),
            Geometry::Mesh(_) => return Err(input.mismatch("boundary or point set")),
        };
        if points.is_empty() {
            return Err(CamError::DegenerateGeometry {
                loop_index: 0,
                reason: "no drill points".into(),
            });
        }

        let z = input.bottom_z();
        debug!(holes = points.len(), z, "drill points");
        let segments = points
            .iter()
            .map(|p| Segment::new(vec![Point3::new(p.x, p.y, z)], SegmentKind::Clearing))
            .collect();

        Ok(StrategyOutput {
            layers: vec![Layer { z, segments }],
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{Boundary2D, Polygon};
    use crate::geometry::SurfaceMesh;
    use crate::tool::{Tool, ToolEntry};
    use crate::CamSettings;
    use approx::assert_relative_eq;

    fn run(geometry: &Geometry) -> Result<StrategyOutput> {
        let tool = ToolEntry::new(3, "drill", Tool::FlatEndMill { diameter: 5.0 });
        let settings = CamSettings {
            depth: 8.0,
            ..Default::default()
        };
        let input = StrategyInput {
            geometry,
            geometry_name: "plate",
            tool: &tool,
            settings: &settings,
            top_z: 0.0,
            contact: None,
        };
        Drill::default().generate(&input)
    }

    #[test]
    fn test_drills_hole_centres() {
        let outer = Polygon::rectangle(0.0, 0.0, 100.0, 50.0);
        let holes = vec![
            Polygon::circle(Point2::new(20.0, 25.0), 4.0, 24),
            Polygon::circle(Point2::new(80.0, 25.0), 4.0, 24),
        ];
        let g = Geometry::Boundary(Boundary2D::new(outer, holes).unwrap());
        let out = run(&g).unwrap();
        assert_eq!(out.layers.len(), 1);
        let segs = &out.layers[0].segments;
        assert_eq!(segs.len(), 2);
        let p = segs[0].points[0];
        assert_relative_eq!(p.x, 20.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 25.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, -8.0);
    }

    #[test]
    fn test_drills_point_set_and_plain_outline() {
        let g = Geometry::Points {
            points: vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0), Point2::new(5.0, 6.0)],
        };
        assert_eq!(run(&g).unwrap().segment_count(), 3);

        let g = Geometry::Boundary(Boundary2D::simple(Polygon::rectangle(0.0, 0.0, 10.0, 6.0)).unwrap());
        let out = run(&g).unwrap();
        let p = out.layers[0].segments[0].points[0];
        assert_relative_eq!(p.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mesh_and_empty_point_set_are_rejected() {
        let g = Geometry::Mesh(SurfaceMesh::default());
        assert!(matches!(run(&g), Err(CamError::GeometryMismatch { .. })));
        let g = Geometry::Points { points: Vec::new() };
        assert!(matches!(run(&g), Err(CamError::DegenerateGeometry { .. })));
    }
}
