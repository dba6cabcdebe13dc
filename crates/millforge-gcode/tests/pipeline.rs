//! End-to-end tests: job description to G-code text.

use approx::assert_relative_eq;
use millforge_cam::{
    Boundary2D, CamError, CamJob, CamSettings, CompileOptions, CompiledJob, Drill, EdgeTabs,
    ErrorPolicy, Geometry, JobController, JobError, MoveKind, Operation, OperationEntry,
    PocketContour, PocketZigZag, Polygon, Profile, ProfileSide, Stock, SurfaceMesh, SurfaceZigZag,
    Tool, ToolEntry,
};
use millforge_gcode::{generate_gcode, PostFlavor, PostSettings};
use millforge_math::{Point2, Point3};

fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
    Geometry::Boundary(Boundary2D::simple(Polygon::rectangle(min_x, min_y, max_x, max_y)).unwrap())
}

fn base_job() -> CamJob {
    let mut job = CamJob::new(
        "bracket",
        Stock::new(Point3::new(0.0, 0.0, -15.0), Point3::new(100.0, 50.0, 0.0)),
    );
    job.tools
        .add(ToolEntry::new(1, "6mm flat", Tool::FlatEndMill { diameter: 6.0 }));
    job.tools
        .add(ToolEntry::new(2, "2mm flat", Tool::FlatEndMill { diameter: 2.0 }));
    job.tools.add(
        ToolEntry::new(3, "4mm ball", Tool::BallEndMill { diameter: 4.0 })
            .with_cutting_data(16000.0, 900.0, 250.0),
    );
    job.add_geometry("outline", rect(0.0, 0.0, 100.0, 50.0));
    job.add_geometry("sliver", rect(40.0, 20.0, 41.5, 30.0));
    job.add_geometry("boss", rect(30.0, 15.0, 70.0, 35.0));
    job.add_geometry(
        "holes",
        Geometry::Points {
            points: vec![Point2::new(10.0, 10.0), Point2::new(90.0, 40.0)],
        },
    );
    job.add_geometry(
        "ramp",
        Geometry::Mesh(SurfaceMesh::new(
            vec![
                Point3::new(0.0, 0.0, -8.0),
                Point3::new(40.0, 0.0, -2.0),
                Point3::new(40.0, 40.0, -2.0),
                Point3::new(0.0, 40.0, -8.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )),
    );
    job.settings = CamSettings {
        stepover: 3.0,
        stepdown: 5.0,
        depth: 10.0,
        clearance_height: 5.0,
        tolerance: 0.01,
        top_z: None,
    };
    job
}

fn pocket() -> OperationEntry {
    OperationEntry::new("pocket", 1, "outline", Operation::Pocket(PocketZigZag::new(false)))
}

fn full_job() -> CamJob {
    let mut job = base_job();
    job.add_operation(OperationEntry::new(
        "clear",
        1,
        "outline",
        Operation::Pocket(PocketZigZag::new(true)),
    ));
    job.add_operation(OperationEntry::new(
        "boss",
        1,
        "boss",
        Operation::Profile(Profile::new(ProfileSide::Outside)),
    ));
    job.add_operation(OperationEntry::new(
        "drill",
        2,
        "holes",
        Operation::Drill(Drill::default()),
    ));
    job.add_operation(OperationEntry::new(
        "finish",
        3,
        "ramp",
        Operation::Surface(SurfaceZigZag::new()),
    ));
    job
}

fn compile(job: &CamJob) -> CompiledJob {
    JobController::new(job).compile().unwrap()
}

#[test]
fn test_pipeline_is_deterministic() {
    let job = full_job();
    let settings = PostSettings {
        flavor: PostFlavor::LinuxCnc,
        line_numbers: true,
        ..Default::default()
    };
    let first = generate_gcode(&compile(&job), &settings).unwrap();
    let second = generate_gcode(&compile(&job), &settings).unwrap();
    assert_eq!(first, second);

    let serial = JobController::new(&job)
        .with_options(CompileOptions {
            parallel: false,
            ..Default::default()
        })
        .compile()
        .unwrap();
    assert_eq!(generate_gcode(&serial, &settings).unwrap(), first);
}

#[test]
fn test_program_structure() {
    let gcode = generate_gcode(&compile(&full_job()), &PostSettings::default()).unwrap();
    assert!(gcode.starts_with("(bracket)\nG90 G94 G17\nG21\nT1 M6\nM3 S12000\n"));
    assert!(gcode.ends_with("M5\nM30\n"));

    let position = |needle: &str| gcode.find(needle).unwrap();
    assert!(position("(clear)") < position("(boss)"));
    assert!(position("(boss)") < position("(drill)"));
    assert!(position("(drill)") < position("(finish)"));
    assert!(gcode.contains("T2 M6"));
    assert!(gcode.contains("M3 S16000"));
}

#[test]
fn test_rectangular_pocket_scenario() {
    let mut job = base_job();
    job.add_operation(pocket());
    let compiled = compile(&job);

    let cuts: Vec<_> = compiled
        .moves()
        .filter(|m| m.kind == MoveKind::LinearCut)
        .collect();
    assert!(!cuts.is_empty());
    for m in &cuts {
        for p in [m.start, m.end] {
            assert!(p.x >= 3.0 - 1e-6 && p.x <= 97.0 + 1e-6, "x out of range: {p:?}");
            assert!(p.y >= 3.0 - 1e-6 && p.y <= 47.0 + 1e-6, "y out of range: {p:?}");
            assert!(
                (p.z + 5.0).abs() < 1e-9 || (p.z + 10.0).abs() < 1e-9,
                "unexpected layer {}",
                p.z
            );
        }
    }

    let mut rows: Vec<f64> = cuts
        .iter()
        .filter(|m| (m.end.z + 5.0).abs() < 1e-9)
        .map(|m| m.end.y)
        .collect();
    rows.sort_by(|a, b| a.total_cmp(b));
    rows.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
    assert_eq!(rows.len(), 15);
    for pair in rows.windows(2) {
        assert_relative_eq!(pair[1] - pair[0], 3.0, epsilon = 1e-6);
    }

    let settings = PostSettings {
        comments: false,
        ..Default::default()
    };
    let gcode = generate_gcode(&compiled, &settings).unwrap();
    assert!(gcode.contains("G0 X3 Y4 Z5\nG1 Z-5 F300\nX97 F1000\n"));
}

#[test]
fn test_equal_feeds_printed_once() {
    let mut job = base_job();
    job.add_operation(pocket());
    let gcode = generate_gcode(&compile(&job), &PostSettings::default()).unwrap();
    // one plunge and one cutting feed word per layer
    assert_eq!(gcode.lines().filter(|l| l.contains("F1000")).count(), 2);
    assert_eq!(gcode.lines().filter(|l| l.contains("F300")).count(), 2);
}

#[test]
fn test_feature_too_small_scenario() {
    let mut job = base_job();
    job.add_operation(OperationEntry::new(
        "sliver",
        2,
        "sliver",
        Operation::Profile(Profile::new(ProfileSide::Inside)),
    ));
    match JobController::new(&job).compile() {
        Err(JobError::Operation(err)) => {
            assert_eq!(err.name, "sliver");
            match err.source {
                CamError::FeatureTooSmall { tool_radius, .. } => {
                    assert_relative_eq!(tool_radius, 1.0)
                }
                other => panic!("expected FeatureTooSmall, got {other:?}"),
            }
        }
        other => panic!("expected operation failure, got {other:?}"),
    }
}

#[test]
fn test_skipped_operation_is_not_emitted() {
    let mut job = base_job();
    job.add_operation(pocket());
    job.add_operation(OperationEntry::new(
        "sliver",
        2,
        "sliver",
        Operation::Profile(Profile::new(ProfileSide::Inside)),
    ));
    job.add_operation(OperationEntry::new(
        "drill",
        2,
        "holes",
        Operation::Drill(Drill::default()),
    ));
    let compiled = JobController::new(&job)
        .with_options(CompileOptions {
            error_policy: ErrorPolicy::SkipAndContinue,
            ..Default::default()
        })
        .compile()
        .unwrap();
    assert_eq!(compiled.skipped.len(), 1);

    let gcode = generate_gcode(&compiled, &PostSettings::default()).unwrap();
    assert!(gcode.contains("(pocket)"));
    assert!(gcode.contains("(drill)"));
    assert!(!gcode.contains("(sliver)"));
}

const MIXED_JOB: &str = r#"{
  "name": "mixed",
  "stock": { "min": [0, 0, -10], "max": [60, 40, 0] },
  "tools": {
    "tools": [
      { "number": 1, "name": "6mm flat", "tool": { "type": "FlatEndMill", "diameter": 6 },
        "spindle_rpm": 12000, "cut_feed": 1000, "plunge_feed": 300 },
      { "number": 2, "name": "4mm ball", "tool": { "type": "BallEndMill", "diameter": 4 },
        "spindle_rpm": 16000, "cut_feed": 900, "plunge_feed": 250 }
    ]
  },
  "geometry": {
    "good": { "type": "Boundary", "outer": [[0, 0], [30, 0], [30, 20], [0, 20]] },
    "bowtie": { "type": "Boundary", "outer": [[0, 0], [10, 10], [10, 0], [0, 10]] },
    "torn": { "type": "Mesh", "vertices": [[0, 0, -1], [10, 0, -1], [0, 10, -1]],
              "indices": [[0, 1, 7]] }
  },
  "settings": { "stepover": 3, "stepdown": 2, "depth": 2, "clearance_height": 5, "tolerance": 0.01 },
  "operations": [
    { "name": "good", "tool": 1, "geometry": "good", "operation": { "type": "Pocket" } },
    { "name": "bowtie", "tool": 1, "geometry": "bowtie", "operation": { "type": "Pocket" } },
    { "name": "torn", "tool": 2, "geometry": "torn", "operation": { "type": "Surface" } }
  ]
}"#;

#[test]
fn test_invalid_geometry_fails_only_its_operation() {
    let job = CamJob::from_json(MIXED_JOB).unwrap();
    match JobController::new(&job).compile() {
        Err(JobError::Operation(err)) => {
            assert_eq!(err.name, "bowtie");
            assert!(matches!(err.source, CamError::DegenerateGeometry { .. }));
        }
        other => panic!("expected the bowtie to abort the job, got {other:?}"),
    }

    let compiled = JobController::new(&job)
        .with_options(CompileOptions {
            error_policy: ErrorPolicy::SkipAndContinue,
            ..Default::default()
        })
        .compile()
        .unwrap();
    let skipped: Vec<&str> = compiled.skipped.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(skipped, vec!["bowtie", "torn"]);
    assert!(compiled
        .skipped
        .iter()
        .all(|e| matches!(e.source, CamError::DegenerateGeometry { .. })));

    let gcode = generate_gcode(&compiled, &PostSettings::default()).unwrap();
    assert!(gcode.contains("(good)"));
    assert!(!gcode.contains("(bowtie)"));
}

#[test]
fn test_surface_rows_are_not_replunged() {
    let mut job = base_job();
    job.add_operation(OperationEntry::new(
        "finish",
        3,
        "ramp",
        Operation::Surface(SurfaceZigZag::new()),
    ));
    let compiled = compile(&job);
    let plunges = compiled.moves().filter(|m| m.kind == MoveKind::Plunge).count();
    assert_eq!(plunges, 1);
}

#[test]
fn test_contour_pocket_and_tabbed_cutout() {
    let mut job = base_job();
    job.add_operation(OperationEntry::new(
        "rings",
        1,
        "boss",
        Operation::PocketContour(PocketContour::new(false)),
    ));
    job.add_operation(OperationEntry::new(
        "cutout",
        1,
        "outline",
        Operation::Profile(
            Profile::new(ProfileSide::Outside).with_tabs(EdgeTabs::evenly(4, 5.0, 2.0)),
        ),
    ));
    let compiled = compile(&job);
    assert!(compiled.skipped.is_empty());

    let rings = &compiled.toolpaths[0].toolpath;
    assert!(rings.iter().all(|m| m.end.z >= -10.0 - 1e-9));

    // final layer at -10 stands the tabs 2 high
    let cutout = &compiled.toolpaths[1].toolpath;
    let on_tabs: f64 = cutout
        .iter()
        .filter(|m| m.kind == MoveKind::LinearCut)
        .filter(|m| (m.start.z + 8.0).abs() < 1e-9 && (m.end.z + 8.0).abs() < 1e-9)
        .map(|m| m.length())
        .sum();
    assert_relative_eq!(on_tabs, 20.0, epsilon = 1e-6);
    let deepest = cutout.iter().map(|m| m.end.z).fold(f64::INFINITY, f64::min);
    assert_relative_eq!(deepest, -10.0);
}

#[test]
fn test_emitted_depth_never_below_target() {
    let gcode = generate_gcode(&compile(&full_job()), &PostSettings::default()).unwrap();
    let deepest = gcode
        .split_whitespace()
        .filter_map(|w| w.strip_prefix('Z'))
        .filter_map(|v| v.parse::<f64>().ok())
        .fold(f64::INFINITY, f64::min);
    assert!(deepest >= -10.0 - 1e-9, "deepest Z {deepest}");
}

#[test]
fn test_moves_serialize_for_viewers() {
    let mut job = base_job();
    job.add_operation(pocket());
    let compiled = compile(&job);
    let moves: Vec<_> = compiled.moves().collect();
    let json = serde_json::to_string(&moves).unwrap();
    assert!(json.contains("LinearCut"));
    assert!(json.contains("Plunge"));
}

#[test]
fn test_demo_job_compiles() {
    let job = CamJob::from_json(include_str!("../../../demos/bracket.json")).unwrap();
    assert_eq!(job.operations.len(), 4);
    let compiled = compile(&job);
    assert_eq!(compiled.toolpaths.len(), 4);
    assert!(compiled.skipped.is_empty());

    let settings = PostSettings {
        flavor: PostFlavor::LinuxCnc,
        ..Default::default()
    };
    let gcode = generate_gcode(&compiled, &settings).unwrap();
    assert!(gcode.contains("T1 G43 H1 M6"));
    assert!(gcode.contains("T2 G43 H2 M6"));
    assert!(gcode.contains("T3 G43 H3 M6"));
}
