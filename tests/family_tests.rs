//! Family construction, lookup and migration tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use schema_family::source;
use schema_family::{
    Capabilities, Family, FamilyBuilder, FamilyConfig, FamilyError, JsonSchemaCompiler, LensError,
    LensRegistry, SchemaCompiler, SchemaVersion,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn dashboard_family() -> Family {
    let document = source::read_document(fixture_path("dashboard_family.json")).unwrap();
    FamilyBuilder::new().build_document(&document).unwrap()
}

/// Raw family with one distinguishable leaf per coordinate
fn raw_family(shape: &[usize]) -> Value {
    let seqs: Vec<Value> = shape
        .iter()
        .enumerate()
        .map(|(major, &n)| {
            (0..n)
                .map(|minor| json!({"title": format!("s{}{}", major, minor)}))
                .collect()
        })
        .collect();
    json!({ "seqs": seqs })
}

/// Registry whose lenses record the version they were applied for
fn recording_lenses(versions: &[(usize, usize)], calls: &Arc<Mutex<Vec<SchemaVersion>>>) -> LensRegistry {
    let mut registry = LensRegistry::new();
    for &(major, minor) in versions {
        let version = SchemaVersion::new(major, minor);
        let calls = Arc::clone(calls);
        registry.register_fn(version, move |artifact| {
            calls.lock().unwrap().push(version);
            let mut out = artifact.clone();
            out["steps"]
                .as_array_mut()
                .ok_or_else(|| LensError::custom("artifact has no steps list"))?
                .push(json!(version.to_string()));
            Ok(out)
        });
    }
    registry
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_numbering_follows_position() {
    init_tracing();
    let shapes: &[&[usize]] = &[&[], &[1], &[3], &[1, 2], &[2, 0, 4], &[0], &[5, 1, 1, 3]];

    for shape in shapes {
        let family = FamilyBuilder::new().build(&raw_family(shape)).unwrap();
        assert_eq!(family.len(), shape.len(), "shape {:?}", shape);

        for (major, &n) in shape.iter().enumerate() {
            let seq = family.seq(major).unwrap();
            assert_eq!(seq.len(), n);
            for (minor, schema) in seq.iter().enumerate() {
                assert_eq!(schema.version(), SchemaVersion::new(major, minor));
                assert_eq!(schema.raw()["title"], json!(format!("s{}{}", major, minor)));
            }
        }
        assert_eq!(family.schema_count(), shape.iter().sum::<usize>());
    }
}

#[test]
fn test_versions_are_sorted_and_unique() {
    let family = FamilyBuilder::new().build(&raw_family(&[2, 0, 3])).unwrap();
    let versions: Vec<_> = family.versions().collect();
    let mut sorted = versions.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(versions, sorted);
    assert_eq!(versions.len(), 5);
}

#[test]
fn test_explicit_version_fields_are_ignored() {
    let raw = json!({"seqs": [[{"version": "7.3"}, {"version": "0.0"}]]});
    let family = FamilyBuilder::new().build(&raw).unwrap();
    assert_eq!(family.at(0, 0).unwrap().raw()["version"], json!("7.3"));
    assert_eq!(family.at(0, 1).unwrap().raw()["version"], json!("0.0"));
}

#[test]
fn test_build_is_idempotent() {
    let raw = raw_family(&[2, 1, 3]);
    let builder = FamilyBuilder::new();
    let first = builder.build(&raw).unwrap();
    let second = builder.build(&raw).unwrap();

    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.versions().collect::<Vec<_>>(), second.versions().collect::<Vec<_>>());

    let fixture = dashboard_family();
    let again = dashboard_family();
    assert_eq!(fixture.fingerprint(), again.fingerprint());
    let samples = [
        json!({"title": "a"}),
        json!({"title": 1}),
        json!({"title": "a", "panels": [], "style": "dark"}),
        json!({"title": "a", "panels": [], "style": "neon"}),
    ];
    for (a, b) in fixture.schemas().zip(again.schemas()) {
        for sample in &samples {
            assert_eq!(a.validate(sample), b.validate(sample));
        }
    }

    assert_ne!(first.fingerprint(), fixture.fingerprint());
}

#[test]
fn test_scenario_two_majors() {
    let raw = json!({"seqs": [
        [{"title": "s00"}],
        [{"title": "s10"}, {"title": "s11"}]
    ]});
    let family = FamilyBuilder::new().build(&raw).unwrap();

    assert_eq!(family.len(), 2);
    assert_eq!(family.seq(0).unwrap().len(), 1);
    assert_eq!(family.seq(1).unwrap().len(), 2);
    assert_eq!(family.at(0, 0).unwrap().raw(), &json!({"title": "s00"}));
    assert_eq!(family.at(1, 0).unwrap().raw(), &json!({"title": "s10"}));

    let latest = family.latest().unwrap();
    assert_eq!(latest.version(), SchemaVersion::new(1, 1));
    assert_eq!(latest.raw(), &json!({"title": "s11"}));
}

#[test]
fn test_scenario_empty_family() {
    let family = FamilyBuilder::new().build(&json!({"seqs": []})).unwrap();
    assert!(family.is_empty());
    assert_eq!(family.len(), 0);
    assert!(matches!(family.latest(), Err(FamilyError::EmptyFamily)));
    assert!(matches!(family.validate_latest(&json!({})), Err(FamilyError::EmptyFamily)));
}

#[test]
fn test_scenario_leaf_failure() {
    let compiler = |version: SchemaVersion, raw: &Value| -> Result<Capabilities, String> {
        if version == SchemaVersion::new(0, 1) {
            return Err("leaf cannot be interpreted as a schema".to_string());
        }
        JsonSchemaCompiler::default().compile(version, raw)
    };

    let result = FamilyBuilder::new()
        .with_compiler(compiler)
        .build(&raw_family(&[3, 2]));

    match result {
        Err(FamilyError::SchemaConstruction { major, minor, reason }) => {
            assert_eq!((major, minor), (0, 1));
            assert!(reason.contains("cannot be interpreted"));
        }
        other => panic!("Expected SchemaConstruction(0, 1), got {:?}", other.map(|f| f.len())),
    }
}

#[test]
fn test_missing_seqs_field_is_malformed() {
    let err = FamilyBuilder::new().build(&json!({"sequences": [[{}]]})).unwrap_err();
    assert!(matches!(err, FamilyError::MalformedFamily { .. }));

    let err = FamilyBuilder::new().build_document(&json!({"panelFamily": {}})).unwrap_err();
    assert!(matches!(err, FamilyError::MalformedFamily { .. }));
}

// =============================================================================
// Lookup
// =============================================================================

#[test]
fn test_latest_matches_last_coordinate() {
    for shape in [&[1usize][..], &[2, 3], &[4, 1, 2]] {
        let family = FamilyBuilder::new().build(&raw_family(shape)).unwrap();
        let m = shape.len() - 1;
        let n = shape[m] - 1;
        assert_eq!(
            family.latest().unwrap().version(),
            family.at(m, n).unwrap().version()
        );
    }
}

#[test]
fn test_latest_with_empty_last_seq() {
    let family = FamilyBuilder::new().build(&raw_family(&[2, 0])).unwrap();
    assert!(matches!(family.latest(), Err(FamilyError::EmptySeq { major: 1 })));
    assert_eq!(family.latest_in(0).unwrap().version(), SchemaVersion::new(0, 1));
}

#[test]
fn test_at_out_of_range() {
    let family = FamilyBuilder::new().build(&raw_family(&[2])).unwrap();
    assert!(matches!(family.at(0, 2), Err(FamilyError::NotFound { major: 0, minor: 2 })));
    assert!(matches!(family.at(1, 0), Err(FamilyError::NotFound { major: 1, minor: 0 })));
    assert!(family.get((0, 1)).is_ok());
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_reports_failed_constraints() {
    init_tracing();
    let family = dashboard_family();

    assert!(family.validate_at(&json!({"title": "Ops"}), (0, 0)).is_ok());

    let err = family
        .validate_at(&json!({"title": "Ops", "rows": []}), (1, 1))
        .unwrap_err();
    let FamilyError::Validation(validation) = err else {
        panic!("Expected a validation error");
    };
    assert_eq!(validation.version, SchemaVersion::new(1, 1));
    // missing panels, missing style, unexpected rows
    assert!(validation.violations.len() >= 2);
    assert!(validation.violations.iter().all(|v| !v.message.is_empty()));
    assert!(validation
        .violations
        .iter()
        .any(|v| v.schema_path.contains("required")));
}

// =============================================================================
// Migration
// =============================================================================

#[test]
fn test_backwards_migration_fails() {
    let family = FamilyBuilder::new().build(&raw_family(&[1, 1])).unwrap();
    let err = family.migrate(&json!({}), (1, 0), (0, 0)).unwrap_err();
    assert!(matches!(
        err,
        FamilyError::InvalidMigrationDirection { from, to }
            if from == SchemaVersion::new(1, 0) && to == SchemaVersion::new(0, 0)
    ));

    // direction is checked before existence
    let empty = FamilyBuilder::new().build(&json!({"seqs": []})).unwrap();
    assert!(matches!(
        empty.migrate(&json!({}), (1, 0), (0, 0)),
        Err(FamilyError::InvalidMigrationDirection { .. })
    ));
}

#[test]
fn test_lenses_chain_in_version_order() {
    init_tracing();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let lenses = recording_lenses(&[(0, 1), (1, 0), (1, 1)], &calls);
    let family = FamilyBuilder::new()
        .with_lenses(lenses)
        .build(&raw_family(&[2, 2]))
        .unwrap();

    let migrated = family.migrate(&json!({"steps": []}), (0, 0), (1, 1)).unwrap();

    let expected = vec![
        SchemaVersion::new(0, 1),
        SchemaVersion::new(1, 0),
        SchemaVersion::new(1, 1),
    ];
    assert_eq!(*calls.lock().unwrap(), expected);
    assert_eq!(migrated, json!({"steps": ["v0.1", "v1.0", "v1.1"]}));
}

#[test]
fn test_partial_migration_range() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let lenses = recording_lenses(&[(0, 1), (0, 2), (1, 0)], &calls);
    let family = FamilyBuilder::new()
        .with_lenses(lenses)
        .build(&raw_family(&[3, 1]))
        .unwrap();

    let migrated = family.migrate(&json!({"steps": []}), (0, 1), (0, 2)).unwrap();
    assert_eq!(migrated, json!({"steps": ["v0.2"]}));
    assert_eq!(*calls.lock().unwrap(), vec![SchemaVersion::new(0, 2)]);
}

#[test]
fn test_missing_lens_fails_closed() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let lenses = recording_lenses(&[(0, 1), (1, 1)], &calls);
    let family = FamilyBuilder::new()
        .with_lenses(lenses)
        .build(&raw_family(&[2, 2]))
        .unwrap();

    let artifact = json!({"steps": []});
    let err = family.migrate(&artifact, (0, 0), (1, 1)).unwrap_err();

    assert!(matches!(err, FamilyError::NoMigrationPath { major: 1, minor: 0 }));
    assert_eq!(artifact, json!({"steps": []}));
    assert!(calls.lock().unwrap().is_empty(), "no lens runs when the path is incomplete");
}

#[test]
fn test_first_version_has_no_lens() {
    let family = FamilyBuilder::new().build(&raw_family(&[1, 1])).unwrap();
    assert!(!family.at(0, 0).unwrap().has_lens());
    assert!(matches!(
        family.migrate(&json!({}), (0, 0), (1, 0)),
        Err(FamilyError::NoMigrationPath { major: 1, minor: 0 })
    ));
}

#[test]
fn test_failing_lens_is_reported() {
    let lenses = LensRegistry::new().with_fn(SchemaVersion::new(0, 1), |_| {
        Err(LensError::custom("panel type 'singlestat' has no replacement"))
    });
    let family = FamilyBuilder::new()
        .with_lenses(lenses)
        .build(&raw_family(&[2]))
        .unwrap();

    match family.migrate(&json!({}), (0, 0), (0, 1)) {
        Err(FamilyError::Lens { version, source }) => {
            assert_eq!(version, SchemaVersion::new(0, 1));
            assert!(source.to_string().contains("singlestat"));
        }
        other => panic!("Expected lens failure, got {:?}", other),
    }
}

#[test]
fn test_migrate_fixture_to_latest() {
    init_tracing();
    let family = dashboard_family();
    let legacy = json!({
        "title": "Ops",
        "refresh": "5s",
        "rows": [{"height": 250}]
    });
    family.validate_at(&legacy, (0, 0)).unwrap();

    let migrated = family.migrate_checked(&legacy, (0, 0), (1, 1)).unwrap();
    assert_eq!(
        migrated,
        json!({
            "title": "Ops",
            "time": {"refresh": "5s"},
            "panels": [{"height": 250}],
            "style": "dark"
        })
    );
    assert_eq!(family.migrate_to_latest(&legacy, (0, 0)).unwrap(), migrated);

    let unstyled = json!({"title": "Ops", "panels": []});
    let lifted = family.migrate(&unstyled, (1, 0), (1, 1)).unwrap();
    assert_eq!(lifted["style"], json!("dark"));

    // a default never overwrites a value already present
    let styled = json!({"title": "Ops", "panels": [], "style": "light"});
    assert_eq!(family.migrate(&styled, (1, 0), (1, 1)).unwrap(), styled);
}

#[test]
fn test_migrate_checked_rejects_invalid_input() {
    let family = dashboard_family();
    let err = family
        .migrate_checked(&json!({"title": 42}), (0, 0), (1, 1))
        .unwrap_err();
    match err {
        FamilyError::Validation(v) => assert_eq!(v.version, SchemaVersion::new(0, 0)),
        other => panic!("Expected Validation, got {:?}", other),
    }
}

// =============================================================================
// Compatibility
// =============================================================================

#[test]
fn test_fixture_compatibility_report() {
    let family = dashboard_family();
    let report = family.check_compatibility();

    assert_eq!(report.steps.len(), 3);
    assert!(report.is_clean());
    assert_eq!(report.missing_lenses().count(), 0);

    let major_step = &report.steps[1];
    assert!(major_step.major_bump);
    assert!(!major_step.result.is_compatible);
    assert!(major_step.has_lens);

    let backfills: Vec<_> = report.backfills().collect();
    assert_eq!(backfills.len(), 1);
    assert_eq!(backfills[0].0.to, SchemaVersion::new(1, 1));
    assert_eq!(backfills[0].1.path, "properties.style");
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_builder_from_config() {
    let config = FamilyConfig::from_toml_str(
        r#"
        [family]
        family_field = "panelFamily"
        seqs_field = "versions"

        [compatibility]
        enforce_minor_compatibility = true
        "#,
    )
    .unwrap();
    let builder = FamilyBuilder::from_config(&config);

    let family = builder
        .build_document(&json!({"panelFamily": {"versions": [[{}, {}]]}}))
        .unwrap();
    assert_eq!(family.schema_count(), 2);

    let breaking = json!({"panelFamily": {"versions": [[
        {"properties": {"a": {"type": "string"}}},
        {"properties": {"a": {"type": "number"}}}
    ]]}});
    assert!(matches!(
        builder.build_document(&breaking),
        Err(FamilyError::IncompatibleMinor { .. })
    ));
}

#[test]
fn test_document_with_instances() {
    let document = json!([
        {"unrelated": {}},
        {"dashboardFamily": {"seqs": [[{}]]}}
    ]);
    let family = FamilyBuilder::new().build_document(&document).unwrap();
    assert_eq!(family.len(), 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_family_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Family>();

    let family = dashboard_family();
    let legacy = json!({"title": "Ops", "refresh": "1m", "rows": []});

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let migrated = family.migrate_to_latest(&legacy, (0, 0)).unwrap();
                    family.validate_latest(&migrated).unwrap();
                    migrated
                })
            })
            .collect();

        let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    });
}
