//! Tool definitions for CAM operations.

use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};

/// Cutter geometry. All cutters are rotationally symmetric about the
/// spindle axis; Z positions refer to the tool tip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Tool {
    /// Flat end mill (square corner).
    FlatEndMill {
        /// Tool diameter.
        diameter: f64,
    },
    /// Ball end mill (hemispherical tip).
    BallEndMill {
        /// Tool diameter.
        diameter: f64,
    },
    /// Chamfer mill / V-bit with an optional flat tip.
    ChamferMill {
        /// Diameter at the top of the cone.
        diameter: f64,
        /// Included angle in degrees (e.g. 60, 90).
        angle: f64,
        /// Flat tip diameter (0 for a sharp point).
        #[serde(default)]
        tip_diameter: f64,
    },
}

impl Tool {
    /// Get the cutting diameter of the tool.
    pub fn diameter(&self) -> f64 {
        match self {
            Tool::FlatEndMill { diameter }
            | Tool::BallEndMill { diameter }
            | Tool::ChamferMill { diameter, .. } => *diameter,
        }
    }

    /// Get the tool radius.
    pub fn radius(&self) -> f64 {
        self.diameter() / 2.0
    }

    /// Height of the cutter surface above the tip at radial distance `rho`.
    ///
    /// Returns `None` outside the cutter footprint.
    pub fn profile_height(&self, rho: f64) -> Option<f64> {
        let r = self.radius();
        if rho > r || rho < 0.0 {
            return None;
        }
        let h = match self {
            Tool::FlatEndMill { .. } => 0.0,
            Tool::BallEndMill { .. } => r - (r * r - rho * rho).max(0.0).sqrt(),
            Tool::ChamferMill {
                angle,
                tip_diameter,
                ..
            } => {
                let tip_r = tip_diameter / 2.0;
                if rho <= tip_r {
                    0.0
                } else {
                    (rho - tip_r) / (angle.to_radians() / 2.0).tan()
                }
            }
        };
        Some(h)
    }

    /// Check the geometric parameters.
    pub fn validate(&self) -> Result<()> {
        let d = self.diameter();
        if !d.is_finite() || d <= 0.0 {
            return Err(CamError::InvalidParameter {
                name: "diameter",
                value: d,
                reason: "must be positive",
            });
        }
        if let Tool::ChamferMill {
            angle,
            tip_diameter,
            ..
        } = self
        {
            if !(*angle > 0.0 && *angle < 180.0) {
                return Err(CamError::InvalidParameter {
                    name: "angle",
                    value: *angle,
                    reason: "must be between 0 and 180 degrees",
                });
            }
            if !(*tip_diameter >= 0.0 && *tip_diameter < d) {
                return Err(CamError::InvalidParameter {
                    name: "tip_diameter",
                    value: *tip_diameter,
                    reason: "must be non-negative and below the diameter",
                });
            }
        }
        Ok(())
    }
}

/// A tool entry in a tool library with cutting data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Tool number (T1, T2, etc.).
    pub number: u32,
    /// Tool name/description.
    #[serde(default)]
    pub name: String,
    /// The tool definition.
    pub tool: Tool,
    /// Spindle speed (RPM).
    pub spindle_rpm: f64,
    /// Feed rate for cutting moves (units/min).
    pub cut_feed: f64,
    /// Feed rate for plunges (units/min).
    pub plunge_feed: f64,
}

impl ToolEntry {
    /// Create a new tool entry with default cutting data.
    pub fn new(number: u32, name: impl Into<String>, tool: Tool) -> Self {
        Self {
            number,
            name: name.into(),
            tool,
            spindle_rpm: 12000.0,
            cut_feed: 1000.0,
            plunge_feed: 300.0,
        }
    }

    /// Set spindle speed and feeds.
    pub fn with_cutting_data(mut self, spindle_rpm: f64, cut_feed: f64, plunge_feed: f64) -> Self {
        self.spindle_rpm = spindle_rpm;
        self.cut_feed = cut_feed;
        self.plunge_feed = plunge_feed;
        self
    }

    /// Check cutter geometry and cutting data.
    pub fn validate(&self) -> Result<()> {
        self.tool.validate()?;
        for (name, value) in [
            ("spindle_rpm", self.spindle_rpm),
            ("cut_feed", self.cut_feed),
            ("plunge_feed", self.plunge_feed),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CamError::InvalidParameter {
                    name,
                    value,
                    reason: "must be positive",
                });
            }
        }
        Ok(())
    }
}

/// The tool table of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolLibrary {
    /// The tools in this library.
    pub tools: Vec<ToolEntry>,
}

impl ToolLibrary {
    /// Create a new empty tool library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool to the library.
    pub fn add(&mut self, entry: ToolEntry) {
        self.tools.push(entry);
    }

    /// Get a tool by its number.
    pub fn get_by_number(&self, number: u32) -> Option<&ToolEntry> {
        self.tools.iter().find(|t| t.number == number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tool_diameter() {
        let tool = Tool::FlatEndMill { diameter: 6.0 };
        assert_relative_eq!(tool.diameter(), 6.0);
        assert_relative_eq!(tool.radius(), 3.0);
    }

    #[test]
    fn test_profile_heights() {
        let flat = Tool::FlatEndMill { diameter: 6.0 };
        assert_eq!(flat.profile_height(2.9), Some(0.0));
        assert_eq!(flat.profile_height(3.1), None);

        let ball = Tool::BallEndMill { diameter: 6.0 };
        assert_relative_eq!(ball.profile_height(0.0).unwrap(), 0.0);
        assert_relative_eq!(ball.profile_height(3.0).unwrap(), 3.0);

        let vbit = Tool::ChamferMill {
            diameter: 10.0,
            angle: 90.0,
            tip_diameter: 2.0,
        };
        assert_relative_eq!(vbit.profile_height(0.5).unwrap(), 0.0);
        assert_relative_eq!(vbit.profile_height(4.0).unwrap(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_validate_rejects_bad_chamfer() {
        let tool = Tool::ChamferMill {
            diameter: 6.0,
            angle: 190.0,
            tip_diameter: 0.0,
        };
        assert!(matches!(
            tool.validate(),
            Err(CamError::InvalidParameter { name: "angle", .. })
        ));
        assert!(Tool::FlatEndMill { diameter: 0.0 }.validate().is_err());
    }

    #[test]
    fn test_tool_serialization() {
        let tool = Tool::BallEndMill { diameter: 6.0 };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("BallEndMill"));
        let parsed: Tool = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tool);
    }

    #[test]
    fn test_chamfer_tip_defaults_to_zero() {
        let parsed: Tool =
            serde_json::from_str(r#"{"type":"ChamferMill","diameter":6.0,"angle":60.0}"#).unwrap();
        assert!(matches!(parsed, Tool::ChamferMill { tip_diameter, .. } if tip_diameter == 0.0));
    }

    #[test]
    fn test_tool_library_lookup() {
        let mut lib = ToolLibrary::new();
        lib.add(ToolEntry::new(3, "6mm flat", Tool::FlatEndMill { diameter: 6.0 }));
        assert!(lib.get_by_number(3).is_some());
        assert!(lib.get_by_number(99).is_none());
        assert!(lib.tools[0].validate().is_ok());
    }
}
