//! Raw material volume and work coordinate origin.

use millforge_math::{Bounds3, Point3};
use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};

/// Axis-aligned raw material block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    /// Minimum corner in job coordinates.
    pub min: Point3,
    /// Maximum corner in job coordinates.
    pub max: Point3,
    /// Machine work origin in job coordinates. Defaults to the front-left
    /// corner of the stock top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Point3>,
}

impl Stock {
    /// Stock between two corners with the default work origin.
    pub fn new(min: Point3, max: Point3) -> Self {
        let b = Bounds3::new(min, max);
        Self {
            min: b.min,
            max: b.max,
            origin: None,
        }
    }

    /// Set an explicit work origin.
    pub fn with_origin(mut self, origin: Point3) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Work origin that emitted coordinates are relative to.
    pub fn work_origin(&self) -> Point3 {
        self.origin
            .unwrap_or_else(|| Point3::new(self.min.x, self.min.y, self.max.z))
    }

    /// Z of the stock top, the default top of cut.
    pub fn top(&self) -> f64 {
        self.max.z
    }

    /// Stock volume as bounds.
    pub fn bounds(&self) -> Bounds3 {
        Bounds3::new(self.min, self.max)
    }

    /// Check that the block has positive size along every axis.
    pub fn validate(&self) -> Result<()> {
        let e = self.max - self.min;
        for (name, value) in [("stock.x", e.x), ("stock.y", e.y), ("stock.z", e.z)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CamError::InvalidParameter {
                    name,
                    value,
                    reason: "stock must have positive size",
                });
            }
        }
        Ok(())
    }
}
