//! Ordering and linking of strategy segments into tool motion.
//!
//! Layers are cut shallow to deep. Inside a layer clearing segments come
//! before finishing segments, and each group is ordered by a
//! [`SequencePolicy`]. Segments are linked by retract, rapid and plunge
//! moves through the clearance plane.

use millforge_math::{Point3, Tolerance};
use tracing::trace;

use crate::error::Result;
use crate::operation::{Layer, Segment, SegmentKind, StrategyOutput};
use crate::toolpath::{Move, Toolpath};

const EPS: f64 = Tolerance::DEFAULT.linear;

/// Decides the order in which the segments of one group are cut.
pub trait SequencePolicy: Send + Sync {
    /// Return indices into `segments` in cutting order, starting from the
    /// tool position `from`. Every index appears exactly once.
    fn order(&self, from: Point3, segments: &[&Segment]) -> Vec<usize>;
}

/// Greedy nearest-neighbour ordering: always cut next the segment whose
/// start is closest to where the tool is. Ties go to the lowest index.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestStart;

impl SequencePolicy for NearestStart {
    fn order(&self, from: Point3, segments: &[&Segment]) -> Vec<usize> {
        let mut current_pos = from;
        let mut remaining: Vec<usize> = (0..segments.len()).collect();
        let mut order = Vec::with_capacity(segments.len());

        while !remaining.is_empty() {
            let dist = |i: usize| {
                segments[i]
                    .start()
                    .map_or(f64::MAX, |p| (p - current_pos).norm_squared())
            };
            // min_by keeps the first of equal elements
            let Some((best_idx, _)) = remaining
                .iter()
                .enumerate()
                .min_by(|(_, &a), (_, &b)| dist(a).total_cmp(&dist(b)))
            else {
                break;
            };
            let seg_idx = remaining.remove(best_idx);
            if let Some(end) = segments[seg_idx].end() {
                current_pos = end;
            }
            order.push(seg_idx);
        }
        order
    }
}

/// Turns a [`StrategyOutput`] into one continuous [`Toolpath`].
#[derive(Debug, Clone)]
pub struct Sequencer<P = NearestStart> {
    clearance: f64,
    cut_feed: f64,
    plunge_feed: f64,
    tolerance: f64,
    policy: P,
}

impl Sequencer<NearestStart> {
    /// Sequencer with the nearest-start policy.
    pub fn new(clearance: f64, cut_feed: f64, plunge_feed: f64) -> Self {
        Self {
            clearance,
            cut_feed,
            plunge_feed,
            tolerance: EPS,
            policy: NearestStart,
        }
    }
}

impl<P: SequencePolicy> Sequencer<P> {
    /// Replace the ordering policy.
    pub fn with_policy<Q: SequencePolicy>(self, policy: Q) -> Sequencer<Q> {
        Sequencer {
            clearance: self.clearance,
            cut_feed: self.cut_feed,
            plunge_feed: self.plunge_feed,
            tolerance: self.tolerance,
            policy,
        }
    }

    /// Gap allowed by the continuity check.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Clearance height used for links.
    pub fn clearance(&self) -> f64 {
        self.clearance
    }

    /// Order and link every segment, starting with the tool at `start`.
    ///
    /// The path ends with a retract to clearance.
    pub fn sequence(&self, output: &StrategyOutput, start: Point3) -> Result<Toolpath> {
        let mut toolpath = Toolpath::new();
        let mut pos = start;

        let mut layers: Vec<&Layer> = output.layers.iter().collect();
        layers.sort_by(|a, b| b.z.total_cmp(&a.z));

        for layer in layers {
            for kind in [SegmentKind::Clearing, SegmentKind::Finish] {
                let group: Vec<&Segment> = layer
                    .segments
                    .iter()
                    .filter(|s| s.kind == kind && !s.points.is_empty())
                    .collect();
                for idx in self.policy.order(pos, &group) {
                    let seg = group[idx];
                    let Some(first) = seg.start() else {
                        continue;
                    };
                    self.link(&mut toolpath, &mut pos, first);
                    for p in &seg.points[1..] {
                        push(&mut toolpath, &mut pos, |from| Move::cut(from, *p, self.cut_feed));
                    }
                }
            }
        }

        if pos.z < self.clearance - EPS {
            let up = Point3::new(pos.x, pos.y, self.clearance);
            push(&mut toolpath, &mut pos, |from| Move::retract(from, up));
        }

        trace!(moves = toolpath.len(), "sequenced");
        toolpath.validate_continuity(self.tolerance)?;
        Ok(toolpath)
    }

    /// Move the tool from `pos` to `target`.
    fn link(&self, toolpath: &mut Toolpath, pos: &mut Point3, target: Point3) {
        if Tolerance::DEFAULT.points_equal(pos, &target) {
            return;
        }
        let same_xy = (pos.x - target.x).abs() <= EPS && (pos.y - target.y).abs() <= EPS;
        if same_xy && target.z < pos.z {
            push(toolpath, pos, |from| Move::plunge(from, target, self.plunge_feed));
            return;
        }

        let travel = pos.z.max(self.clearance);
        if pos.z < travel - EPS {
            let up = Point3::new(pos.x, pos.y, travel);
            push(toolpath, pos, |from| Move::retract(from, up));
        }
        let above = Point3::new(target.x, target.y, travel);
        push(toolpath, pos, |from| Move::rapid(from, above));

        if target.z < self.clearance - EPS {
            if travel > self.clearance + EPS {
                let at_clearance = Point3::new(target.x, target.y, self.clearance);
                push(toolpath, pos, |from| Move::rapid(from, at_clearance));
            }
            push(toolpath, pos, |from| Move::plunge(from, target, self.plunge_feed));
        } else {
            // at or above clearance: nothing to cut into
            push(toolpath, pos, |from| Move::rapid(from, target));
        }
    }
}

/// Append the move `make` builds from the tool position unless it has zero
/// length, and advance the tool position.
fn push(toolpath: &mut Toolpath, pos: &mut Point3, make: impl FnOnce(Point3) -> Move) {
    let m = make(*pos);
    if m.length() <= EPS {
        return;
    }
    *pos = m.end;
    toolpath.push(m);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CamError;
    use crate::toolpath::MoveKind;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn seg(points: &[Point3]) -> Segment {
        Segment::new(points.to_vec(), SegmentKind::Clearing)
    }

    fn kinds(tp: &Toolpath) -> Vec<MoveKind> {
        tp.iter().map(|m| m.kind).collect()
    }

    #[test]
    fn test_nearest_start_prefers_closest_then_lowest_index() {
        let a = seg(&[p(10.0, 0.0, 0.0), p(11.0, 0.0, 0.0)]);
        let b = seg(&[p(1.0, 0.0, 0.0), p(2.0, 0.0, 0.0)]);
        let c = seg(&[p(-1.0, 0.0, 0.0), p(-2.0, 0.0, 0.0)]);
        let order = NearestStart.order(p(0.0, 0.0, 0.0), &[&a, &b, &c]);
        // b and c tie at distance 1; b has the lower index
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_single_segment_link_pattern() {
        let out = StrategyOutput {
            layers: vec![Layer {
                z: -1.0,
                segments: vec![seg(&[p(5.0, 5.0, -1.0), p(10.0, 5.0, -1.0)])],
            }],
            warnings: Vec::new(),
        };
        let tp = Sequencer::new(5.0, 800.0, 200.0)
            .sequence(&out, p(0.0, 0.0, 5.0))
            .unwrap();
        assert_eq!(
            kinds(&tp),
            vec![MoveKind::Rapid, MoveKind::Plunge, MoveKind::LinearCut, MoveKind::Retract]
        );
        assert_eq!(tp.moves[1].feed, Some(200.0));
        assert_eq!(tp.moves[2].feed, Some(800.0));
        assert_eq!(tp.end(), Some(p(10.0, 5.0, 5.0)));
    }

    #[test]
    fn test_layers_shallow_first_and_retract_between_segments() {
        let deep = Layer {
            z: -4.0,
            segments: vec![seg(&[p(0.0, 0.0, -4.0), p(10.0, 0.0, -4.0)])],
        };
        let shallow = Layer {
            z: -2.0,
            segments: vec![
                seg(&[p(0.0, 0.0, -2.0), p(10.0, 0.0, -2.0)]),
                seg(&[p(50.0, 0.0, -2.0), p(60.0, 0.0, -2.0)]),
            ],
        };
        let out = StrategyOutput {
            layers: vec![deep, shallow],
            warnings: Vec::new(),
        };
        let tp = Sequencer::new(5.0, 800.0, 200.0)
            .sequence(&out, p(0.0, 0.0, 5.0))
            .unwrap();
        let cuts: Vec<f64> = tp
            .iter()
            .filter(|m| m.kind == MoveKind::LinearCut)
            .map(|m| m.end.z)
            .collect();
        assert_eq!(cuts, vec![-2.0, -2.0, -4.0]);
        assert!(tp
            .moves
            .windows(2)
            .any(|w| w[0].kind == MoveKind::LinearCut && w[1].kind == MoveKind::Retract));
        assert!(tp.validate_continuity(1e-9).is_ok());
    }

    #[test]
    fn test_plunge_straight_down_when_below() {
        let out = StrategyOutput {
            layers: vec![
                Layer {
                    z: -1.0,
                    segments: vec![seg(&[p(0.0, 0.0, -1.0), p(5.0, 0.0, -1.0)])],
                },
                Layer {
                    z: -2.0,
                    segments: vec![seg(&[p(5.0, 0.0, -2.0), p(0.0, 0.0, -2.0)])],
                },
            ],
            warnings: Vec::new(),
        };
        let tp = Sequencer::new(5.0, 800.0, 200.0)
            .sequence(&out, p(0.0, 0.0, 5.0))
            .unwrap();
        assert_eq!(
            kinds(&tp),
            vec![
                MoveKind::Plunge,
                MoveKind::LinearCut,
                MoveKind::Plunge,
                MoveKind::LinearCut,
                MoveKind::Retract
            ]
        );
    }

    #[test]
    fn test_segment_at_clearance_is_reached_by_rapids() {
        let out = StrategyOutput {
            layers: vec![Layer {
                z: 0.0,
                segments: vec![seg(&[p(5.0, 0.0, 5.0), p(10.0, 0.0, 5.0)])],
            }],
            warnings: Vec::new(),
        };
        let tp = Sequencer::new(5.0, 800.0, 200.0)
            .sequence(&out, p(0.0, 0.0, 5.0))
            .unwrap();
        assert_eq!(kinds(&tp), vec![MoveKind::Rapid, MoveKind::LinearCut]);
    }

    #[test]
    fn test_finish_after_clearing_in_layer() {
        let mut finish = seg(&[p(0.0, 0.0, -1.0), p(1.0, 0.0, -1.0)]);
        finish.kind = SegmentKind::Finish;
        let clearing = seg(&[p(20.0, 0.0, -1.0), p(21.0, 0.0, -1.0)]);
        let out = StrategyOutput {
            layers: vec![Layer {
                z: -1.0,
                segments: vec![finish, clearing],
            }],
            warnings: Vec::new(),
        };
        let tp = Sequencer::new(5.0, 800.0, 200.0)
            .sequence(&out, p(0.0, 0.0, 5.0))
            .unwrap();
        let first_cut = tp.iter().find(|m| m.kind == MoveKind::LinearCut).unwrap();
        assert_eq!(first_cut.start.x, 20.0);
    }

    #[test]
    fn test_sequencing_is_deterministic() {
        let segments: Vec<Segment> = (0..20)
            .map(|i| {
                let x = ((i * 7) % 20) as f64;
                seg(&[p(x, 0.0, -1.0), p(x, 3.0, -1.0)])
            })
            .collect();
        let out = StrategyOutput {
            layers: vec![Layer { z: -1.0, segments }],
            warnings: Vec::new(),
        };
        let s = Sequencer::new(5.0, 800.0, 200.0);
        let a = s.sequence(&out, p(0.0, 0.0, 5.0)).unwrap();
        let b = s.sequence(&out, p(0.0, 0.0, 5.0)).unwrap();
        assert_eq!(a, b);
    }

    struct Reversed;

    impl SequencePolicy for Reversed {
        fn order(&self, _from: Point3, segments: &[&Segment]) -> Vec<usize> {
            (0..segments.len()).rev().collect()
        }
    }

    #[test]
    fn test_custom_policy() {
        let out = StrategyOutput {
            layers: vec![Layer {
                z: -1.0,
                segments: vec![
                    seg(&[p(0.0, 0.0, -1.0), p(1.0, 0.0, -1.0)]),
                    seg(&[p(9.0, 0.0, -1.0), p(8.0, 0.0, -1.0)]),
                ],
            }],
            warnings: Vec::new(),
        };
        let tp = Sequencer::new(5.0, 800.0, 200.0)
            .with_policy(Reversed)
            .sequence(&out, p(0.0, 0.0, 5.0))
            .unwrap();
        let first_cut = tp.iter().find(|m| m.kind == MoveKind::LinearCut).unwrap();
        assert_eq!(first_cut.start.x, 9.0);
        assert!(!matches!(
            tp.validate_continuity(1e-9),
            Err(CamError::SequencingInconsistency { .. })
        ));
    }
}
