//! Tests for building tables from preset documents

use presetkit::prelude::*;
use pretty_assertions::assert_eq;

const PRESET: &str = r##"{
    "name": "Fine 0.4",
    "settings": [
        { "key": "nozzle_diameter", "label": "Nozzle Diameter", "type": "float",
          "default_value": 0.4, "unit": "mm" },
        { "key": "layer_height", "label": "Layer Height", "type": "float",
          "value": "nozzle_diameter * 0.5",
          "minimum_value": 0.04, "maximum_value": "nozzle_diameter * 2" },
        { "key": "infill_sparse_density", "type": "int", "default_value": 20,
          "minimum_value": 0, "maximum_value": 100, "saved_value": 35 },
        { "key": "infill_pattern", "type": "enum", "options": ["grid", "lines", "gyroid"],
          "value": "infill_sparse_density > 50 ? 'lines' : 'grid'" },
        { "key": "material_color", "type": "color", "default_value": "#ff8800",
          "visible": false },
        { "key": "support_enable", "type": "bool", "default_value": false },
        { "key": "support_angle", "type": "float", "default_value": 50,
          "enabled": "support_enable" }
    ]
}"##;

#[test]
fn test_load_and_resolve() {
    let mut table = SettingsTable::from_json(PRESET).unwrap();
    assert_eq!(table.name(), Some("Fine 0.4"));
    assert_eq!(table.len(), 7);

    let nozzle = table.setting("nozzle_diameter").unwrap();
    assert_eq!(nozzle.label(), "Nozzle Diameter");
    assert_eq!(nozzle.unit(), Some("mm"));
    assert!(table.setting("material_color").map_or(false, |s| !s.is_visible()));

    // The saved value is queued as an override for the first resolve
    assert_eq!(table.pending_overrides().len(), 1);

    let diagnostics = table.resolve();
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(table.get_value("layer_height"), Some(&SettingValue::Float(0.2)));
    assert_eq!(
        table.get_value("infill_sparse_density"),
        Some(&SettingValue::Int(35))
    );
    assert_eq!(
        table.get_value("infill_pattern"),
        Some(&SettingValue::option("grid"))
    );
    assert_eq!(
        table.get_value("material_color"),
        Some(&SettingValue::Color("#ff8800".into()))
    );
    assert_eq!(table.is_enabled("support_angle"), Some(false));

    // infill_sparse_density is a constant, so the saved value is not a mismatch
    assert!(table.mismatched_keys().is_empty());
}

#[test]
fn test_saved_value_of_formula_setting_is_mismatched() {
    let json = r#"{ "settings": [
        { "key": "nozzle_diameter", "type": "float", "default_value": 0.4 },
        { "key": "line_width", "type": "float", "value": "nozzle_diameter",
          "saved_value": 0.45 }
    ] }"#;

    let mut table = SettingsTable::from_json(json).unwrap();
    table.resolve();
    assert_eq!(table.get_value("line_width"), Some(&SettingValue::Float(0.45)));
    assert_eq!(table.mismatched_keys(), vec!["line_width"]);

    // Without a new override the formula value comes back
    table.resolve();
    assert_eq!(table.get_value("line_width"), Some(&SettingValue::Float(0.4)));
}

#[test]
fn test_lenient_load_reports_broken_formulas() {
    let json = r#"{ "settings": [
        { "key": "a", "type": "float", "value": "1" },
        { "key": "b", "type": "float", "value": "a +* 2", "default_value": 3 },
        { "key": "c", "type": "float", "value": "open('/etc/passwd')" }
    ] }"#;

    let mut table = SettingsTable::from_json(json).unwrap();
    let diagnostics = table.resolve();

    let failing: Vec<_> = diagnostics
        .errors()
        .map(|d| (d.key.as_str(), d.kind))
        .collect();
    assert_eq!(
        failing,
        vec![("b", DiagnosticKind::Compile), ("c", DiagnosticKind::Compile)]
    );
    assert_eq!(table.get_value("a"), Some(&SettingValue::Float(1.0)));
    assert_eq!(table.get_value("b"), Some(&SettingValue::Float(3.0)));
}

#[test]
fn test_strict_load() {
    let document: PresetDocument = serde_json::from_str(PRESET).unwrap();
    assert!(SettingsTable::from_document_strict(document).is_ok());

    let broken: PresetDocument = serde_json::from_str(
        r#"{ "settings": [ { "key": "b", "type": "float", "value": "eval('1')" } ] }"#,
    )
    .unwrap();
    match SettingsTable::from_document_strict(broken) {
        Err(Error::Compile { key, source_text, .. }) => {
            assert_eq!(key, "b");
            assert_eq!(source_text, "eval('1')");
        }
        other => panic!("expected compile error, got {:?}", other),
    }
}

#[test]
fn test_document_errors() {
    let duplicate = r#"{ "settings": [
        { "key": "a", "type": "float" },
        { "key": "a", "type": "int" }
    ] }"#;
    assert_eq!(
        SettingsTable::from_json(duplicate).unwrap_err(),
        Error::DuplicateKey("a".into())
    );

    let bad_default = r#"{ "settings": [
        { "key": "a", "type": "float", "default_value": "fast" }
    ] }"#;
    assert!(matches!(
        SettingsTable::from_json(bad_default),
        Err(Error::InvalidDefault { .. })
    ));

    let bad_option = r#"{ "settings": [
        { "key": "a", "type": "enum", "options": ["x", "y"], "default_value": "z" }
    ] }"#;
    assert!(matches!(
        SettingsTable::from_json(bad_option),
        Err(Error::InvalidDefault { .. })
    ));

    assert!(matches!(
        SettingsTable::from_json(r#"{ "settings": [ { "key": "a" } ] }"#),
        Err(Error::Document(_))
    ));
}
