//! Tests for table resolution: overrides, clamping, mismatch and fault isolation

use presetkit::prelude::*;
use pretty_assertions::assert_eq;

fn table(defs: Vec<SettingDefinition>) -> SettingsTable {
    SettingsTable::new(defs).unwrap()
}

fn float(table: &SettingsTable, key: &str) -> f64 {
    table
        .get_value(key)
        .and_then(SettingValue::as_f64)
        .unwrap_or_else(|| panic!("{} has no numeric value", key))
}

/// Everything observable about a table after a resolve
fn snapshot(table: &SettingsTable) -> Vec<(String, SettingValue, bool, bool)> {
    table
        .settings()
        .map(|s| {
            (
                s.key().to_string(),
                s.value().clone(),
                s.is_mismatched(),
                s.is_enabled(),
            )
        })
        .collect()
}

fn printer_profile() -> SettingsTable {
    table(vec![
        SettingDefinition::float("nozzle_diameter").with_default(0.4).with_unit("mm"),
        SettingDefinition::float("layer_height")
            .with_value("nozzle_diameter * 0.5")
            .with_minimum("0.04")
            .with_maximum("nozzle_diameter * 2"),
        SettingDefinition::float("line_width").with_value("nozzle_diameter"),
        SettingDefinition::int("wall_line_count").with_value("line_width > 0.3 ? 3 : 2"),
        SettingDefinition::float("wall_thickness").with_value("wall_line_count * line_width"),
        SettingDefinition::enumeration("adhesion_type", ["skirt", "brim", "raft"])
            .with_default("skirt"),
        SettingDefinition::int("brim_line_count")
            .with_value("adhesion_type == 'brim' ? 20 : 0")
            .with_enabled("adhesion_type == 'brim'"),
        SettingDefinition::float("support_angle").with_default(50.0),
        SettingDefinition::float("support_angle_rad").with_value("math.radians(support_angle)"),
    ])
}

#[test]
fn test_resolve_computes_formulas() {
    let mut t = printer_profile();
    assert_eq!(t.state(), TableState::Unresolved);

    let diagnostics = t.resolve();
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(t.state(), TableState::Resolved);

    assert_eq!(float(&t, "layer_height"), 0.2);
    assert_eq!(float(&t, "line_width"), 0.4);
    assert_eq!(t.get_value("wall_line_count"), Some(&SettingValue::Int(3)));
    assert_eq!(t.get_value("brim_line_count"), Some(&SettingValue::Int(0)));
    assert_eq!(t.is_enabled("brim_line_count"), Some(false));
    assert_eq!(float(&t, "support_angle_rad"), 50f64.to_radians());
    assert!(t.mismatched_keys().is_empty());
}

#[test]
fn test_idempotence() {
    let mut t = printer_profile();
    t.resolve();
    let first = snapshot(&t);
    t.resolve();
    assert_eq!(snapshot(&t), first);
}

#[test]
fn test_override_precedence() {
    let mut t = table(vec![SettingDefinition::float("speed_print").with_value("5")]);
    t.set_override("speed_print", 7.0);
    t.resolve();

    assert_eq!(float(&t, "speed_print"), 7.0);
    assert_eq!(t.get_mismatch("speed_print"), Some(true));
    assert!(t.pending_overrides().is_empty());
}

#[test]
fn test_override_is_clamped() {
    let mut t = table(vec![SettingDefinition::float("speed_print")
        .with_value("5")
        .with_minimum("2")
        .with_maximum("10")]);

    t.resolve_with([("speed_print", 20.0)]);
    assert_eq!(float(&t, "speed_print"), 10.0);
    assert_eq!(t.get_mismatch("speed_print"), Some(true));
}

#[test]
fn test_explicit_overrides_follow_queued_ones() {
    let mut t = table(vec![SettingDefinition::float("speed_print").with_value("5")]);
    t.set_override("speed_print", 1.0);
    t.set_override("speed_print", 2.0);
    t.resolve_with([("speed_print", 3.0)]);
    assert_eq!(float(&t, "speed_print"), 3.0);

    t.set_override("speed_print", 1.0);
    t.set_override("speed_print", 2.0);
    t.resolve();
    assert_eq!(float(&t, "speed_print"), 2.0);
}

#[test]
fn test_clamping() {
    let mut t = table(vec![
        SettingDefinition::float("too_high")
            .with_value("20")
            .with_minimum("2")
            .with_maximum("10"),
        SettingDefinition::float("too_low")
            .with_value("1")
            .with_minimum("2")
            .with_maximum("10"),
        SettingDefinition::float("inside")
            .with_value("6")
            .with_minimum("2")
            .with_maximum("10"),
    ]);

    let diagnostics = t.resolve();
    assert!(diagnostics.is_empty());
    assert_eq!(float(&t, "too_high"), 10.0);
    assert_eq!(float(&t, "too_low"), 2.0);
    assert_eq!(float(&t, "inside"), 6.0);

    // Mismatch compares against the pre-clamp formula value
    assert_eq!(t.get_mismatch("too_high"), Some(true));
    assert_eq!(t.get_mismatch("inside"), Some(false));
}

#[test]
fn test_clamp_conflict() {
    let mut t = table(vec![SettingDefinition::float("infill_overlap")
        .with_value("7")
        .with_minimum("10")
        .with_maximum("5")]);

    let diagnostics = t.resolve();
    // Maximum first, then minimum
    assert_eq!(float(&t, "infill_overlap"), 10.0);
    assert!(diagnostics.contains("infill_overlap", DiagnosticKind::ClampConflict));
    assert!(!diagnostics.has_errors());
}

#[test]
fn test_int_clamps_to_whole_bounds() {
    let mut t = table(vec![
        SettingDefinition::int("wall_line_count")
            .with_value("10")
            .with_maximum("7.5"),
        SettingDefinition::int("top_layers")
            .with_value("0")
            .with_minimum("2.2"),
    ]);
    t.resolve();
    assert_eq!(t.get_value("wall_line_count"), Some(&SettingValue::Int(7)));
    assert_eq!(t.get_value("top_layers"), Some(&SettingValue::Int(3)));
}

#[test]
fn test_mismatch_epsilon() {
    let mut t = table(vec![SettingDefinition::float("speed_wall").with_value("5")]);

    t.resolve_with([("speed_wall", 5.0000001)]);
    assert_eq!(float(&t, "speed_wall"), 5.0000001);
    assert_eq!(t.get_mismatch("speed_wall"), Some(false));

    t.resolve_with([("speed_wall", 5.1)]);
    assert_eq!(t.get_mismatch("speed_wall"), Some(true));
}

#[test]
fn test_custom_mismatch_epsilon() {
    let mut t = table(vec![SettingDefinition::float("speed_wall").with_value("5")]);
    let options = ResolveOptions {
        mismatch_epsilon: 0.5,
        ..ResolveOptions::default()
    };
    t.resolve_with_options([("speed_wall", 5.1)], &options);
    assert_eq!(t.get_mismatch("speed_wall"), Some(false));
}

#[test]
fn test_non_numeric_mismatch() {
    let mut t = table(vec![
        SettingDefinition::enumeration("adhesion_type", ["skirt", "brim"]).with_value("'brim'"),
    ]);
    t.resolve();
    assert_eq!(t.get_value("adhesion_type"), Some(&SettingValue::option("brim")));
    assert_eq!(t.get_mismatch("adhesion_type"), Some(false));

    t.resolve_with([("adhesion_type", "skirt")]);
    assert_eq!(t.get_mismatch("adhesion_type"), Some(true));
}

#[test]
fn test_constant_settings_never_mismatch() {
    let mut t = table(vec![SettingDefinition::float("speed_travel").with_default(150.0)]);
    t.resolve_with([("speed_travel", 200.0)]);
    assert_eq!(float(&t, "speed_travel"), 200.0);
    assert_eq!(t.get_mismatch("speed_travel"), Some(false));

    // The committed value of a constant persists
    t.resolve();
    assert_eq!(float(&t, "speed_travel"), 200.0);
}

#[test]
fn test_fault_isolation() {
    let mut t = table(vec![
        SettingDefinition::float("a").with_value("1"),
        SettingDefinition::float("b").with_default(7.0).with_value("1 +"),
        SettingDefinition::float("c").with_value("a + 1"),
    ]);

    let diagnostics = t.resolve();
    assert_eq!(float(&t, "a"), 1.0);
    assert_eq!(float(&t, "b"), 7.0);
    assert_eq!(float(&t, "c"), 2.0);
    assert_eq!(t.get_mismatch("b"), Some(false));

    let errors: Vec<_> = diagnostics.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].key, "b");
    assert_eq!(errors[0].kind, DiagnosticKind::Compile);
    assert_eq!(errors[0].role, Some(ExpressionRole::Value));
}

#[test]
fn test_override_of_failed_key_is_dropped() {
    let mut t = table(vec![SettingDefinition::float("b")
        .with_default(7.0)
        .with_value("missing * 2")]);

    let diagnostics = t.resolve_with([("b", 3.0)]);
    assert_eq!(float(&t, "b"), 7.0);
    assert!(diagnostics.contains("b", DiagnosticKind::UnknownReference));
}

#[test]
fn test_failing_bound_isolates_key() {
    let mut t = table(vec![
        SettingDefinition::float("a").with_value("3").with_maximum("1 / 0"),
        SettingDefinition::float("b").with_value("4"),
    ]);

    let diagnostics = t.resolve();
    assert_eq!(float(&t, "a"), 0.0);
    assert_eq!(float(&t, "b"), 4.0);
    let errors: Vec<_> = diagnostics.for_key("a").collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::Evaluation);
    assert_eq!(errors[0].role, Some(ExpressionRole::Maximum));
}

#[test]
fn test_int_clamp_conflict_uses_whole_bounds() {
    // No integer lies in [1.2, 1.8]
    let mut t = table(vec![SettingDefinition::int("wall_line_count")
        .with_value("1")
        .with_minimum("1.2")
        .with_maximum("1.8")]);

    let diagnostics = t.resolve();
    assert!(diagnostics.contains("wall_line_count", DiagnosticKind::ClampConflict));
    assert_eq!(t.get_value("wall_line_count"), Some(&SettingValue::Int(2)));
}

fn bounded_layer_height(formula: &str) -> SettingsTable {
    table(vec![SettingDefinition::float("layer_height")
        .with_default(0.1)
        .with_value(formula)
        .with_minimum("0.04")
        .with_maximum("0.8")])
}

#[test]
fn test_non_finite_formula_result_keeps_value() {
    let mut t = bounded_layer_height("1e308 * 10 - 1e308 * 10");

    let diagnostics = t.resolve();
    let errors: Vec<_> = diagnostics.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::Evaluation);
    assert_eq!(errors[0].role, Some(ExpressionRole::Value));
    assert_eq!(float(&t, "layer_height"), 0.1);
    assert_eq!(t.get_mismatch("layer_height"), Some(false));

    // Overflowing literals never get past compilation
    let mut t = bounded_layer_height("1e400 * 0");
    let diagnostics = t.resolve();
    assert!(diagnostics.contains("layer_height", DiagnosticKind::Compile));
    assert_eq!(float(&t, "layer_height"), 0.1);
}

#[test]
fn test_non_finite_bound() {
    let mut t = table(vec![SettingDefinition::float("speed_print")
        .with_value("50")
        .with_maximum("1e308 * 10")]);

    let diagnostics = t.resolve();
    let errors: Vec<_> = diagnostics.for_key("speed_print").collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::Evaluation);
    assert_eq!(errors[0].role, Some(ExpressionRole::Maximum));
}

#[test]
fn test_round_with_huge_digits_stays_in_bounds() {
    let mut t = table(vec![SettingDefinition::float("speed_print")
        .with_value("round(5, 400)")
        .with_minimum("1")
        .with_maximum("10")]);

    let diagnostics = t.resolve();
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(float(&t, "speed_print"), 5.0);
    assert_eq!(t.get_mismatch("speed_print"), Some(false));
}

#[test]
fn test_non_finite_overrides_are_rejected() {
    let mut t = bounded_layer_height("0.2");

    let diagnostics = t.resolve_with([("layer_height", "nan")]);
    assert!(diagnostics.contains("layer_height", DiagnosticKind::TypeCoercion));
    assert!(diagnostics.has_errors());
    assert_eq!(float(&t, "layer_height"), 0.2);
    assert_eq!(t.get_mismatch("layer_height"), Some(false));

    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let diagnostics = t.resolve_with([("layer_height", value)]);
        assert!(diagnostics.contains("layer_height", DiagnosticKind::TypeCoercion));
        let n = float(&t, "layer_height");
        assert!(n.is_finite() && (0.04..=0.8).contains(&n), "{}", n);
    }
}

#[test]
fn test_long_operator_chain_is_a_compile_error() {
    let chain = format!("0.1{}", " + 0".repeat(1000));
    let mut t = bounded_layer_height(&chain);

    let diagnostics = t.resolve();
    assert!(diagnostics.contains("layer_height", DiagnosticKind::Compile));
    assert_eq!(float(&t, "layer_height"), 0.1);
}

#[test]
fn test_order_sensitivity() {
    let backward = || {
        table(vec![
            SettingDefinition::float("layer_height").with_value("nozzle_diameter * 0.5"),
            SettingDefinition::float("nozzle_diameter").with_default(0.4),
        ])
    };

    let mut t = backward();
    t.resolve();
    assert_eq!(float(&t, "layer_height"), 0.2);

    // layer_height reads nozzle_diameter before the override is committed
    t.resolve_with([("nozzle_diameter", 0.6)]);
    assert_eq!(float(&t, "nozzle_diameter"), 0.6);
    assert_eq!(float(&t, "layer_height"), 0.2);

    // The next pass picks it up
    t.resolve();
    assert_eq!(float(&t, "layer_height"), 0.3);

    // Declaring nozzle_diameter first changes the result of the same edit
    let mut forward = table(vec![
        SettingDefinition::float("nozzle_diameter").with_default(0.4),
        SettingDefinition::float("layer_height").with_value("nozzle_diameter * 0.5"),
    ]);
    forward.resolve();
    forward.resolve_with([("nozzle_diameter", 0.6)]);
    assert_eq!(float(&forward, "layer_height"), 0.3);
}

#[test]
fn test_dependency_order() {
    let mut t = table(vec![
        SettingDefinition::float("layer_height").with_value("nozzle_diameter * 0.5"),
        SettingDefinition::float("nozzle_diameter").with_default(0.4),
    ]);
    let options = ResolveOptions {
        order: EvaluationOrder::Dependency,
        ..ResolveOptions::default()
    };

    let diagnostics = t.resolve_with_options([("nozzle_diameter", 0.6)], &options);
    assert!(diagnostics.is_empty());
    assert_eq!(float(&t, "layer_height"), 0.3);
}

#[test]
fn test_dependency_cycles() {
    let mut t = table(vec![
        SettingDefinition::float("a").with_value("b + 1"),
        SettingDefinition::float("b").with_value("a + 1"),
        SettingDefinition::float("c").with_value("2"),
    ]);

    let diagnostics = t.resolve_with_options(
        Vec::<(String, SettingValue)>::new(),
        &ResolveOptions::dependency_ordered(1),
    );

    let cycles: Vec<_> = diagnostics
        .warnings()
        .filter(|d| d.kind == DiagnosticKind::Cycle)
        .map(|d| d.key.as_str())
        .collect();
    assert_eq!(cycles, vec!["a", "b"]);
    assert!(!diagnostics.has_errors());

    // Cycle members run after c, in declared order, reading stored values
    assert_eq!(float(&t, "c"), 2.0);
    assert_eq!(float(&t, "a"), 1.0);
    assert_eq!(float(&t, "b"), 2.0);
}

#[test]
fn test_fixpoint_iteration() {
    let chain = || {
        table(vec![
            SettingDefinition::float("c").with_value("b * 2"),
            SettingDefinition::float("b").with_value("a * 2"),
            SettingDefinition::float("a").with_default(1.0),
        ])
    };

    let mut single = chain();
    single.resolve();
    assert_eq!(float(&single, "c"), 0.0);

    let mut iterated = chain();
    let options = ResolveOptions {
        max_passes: 5,
        ..ResolveOptions::default()
    };
    iterated.resolve_with_options(Vec::<(String, SettingValue)>::new(), &options);
    assert_eq!(float(&iterated, "b"), 2.0);
    assert_eq!(float(&iterated, "c"), 4.0);
}

#[test]
fn test_reset_discards_queued_overrides() {
    let mut t = table(vec![SettingDefinition::float("speed_print").with_value("50")]);
    t.resolve_with([("speed_print", 70.0)]);
    assert_eq!(t.get_mismatch("speed_print"), Some(true));

    t.set_override("speed_print", 80.0);
    let diagnostics = t.reset();
    assert!(diagnostics.is_empty());
    assert_eq!(float(&t, "speed_print"), 50.0);
    assert_eq!(t.get_mismatch("speed_print"), Some(false));
    assert!(t.pending_overrides().is_empty());
}

#[test]
fn test_unknown_override() {
    let mut t = table(vec![SettingDefinition::float("speed_print").with_value("50")]);
    let diagnostics = t.resolve_with([("speed_infill", 10.0)]);

    let warning = diagnostics.warnings().next().unwrap();
    assert_eq!(warning.kind, DiagnosticKind::UnknownOverride);
    assert_eq!(warning.key, "speed_infill");
    assert_eq!(float(&t, "speed_print"), 50.0);
}

#[test]
fn test_type_coercion() {
    let mut t = table(vec![
        SettingDefinition::int("wall_line_count").with_value("2.5"),
        SettingDefinition::bool("support_enable").with_value("1"),
        SettingDefinition::float("speed_print").with_default(60.0).with_value("'fast'"),
        SettingDefinition::float("speeds").with_default(1.0).with_value("[1, 2]"),
    ]);

    let diagnostics = t.resolve();
    assert_eq!(t.get_value("wall_line_count"), Some(&SettingValue::Int(3)));
    assert_eq!(t.get_value("support_enable"), Some(&SettingValue::Bool(true)));
    assert!(diagnostics
        .for_key("wall_line_count")
        .all(|d| d.kind == DiagnosticKind::TypeCoercion && !d.is_error()));

    // Impossible coercions are per-key errors
    assert_eq!(float(&t, "speed_print"), 60.0);
    assert_eq!(float(&t, "speeds"), 1.0);
    let errors: Vec<_> = diagnostics.errors().map(|d| d.key.as_str()).collect();
    assert_eq!(errors, vec!["speed_print", "speeds"]);
}

#[test]
fn test_bounds_on_non_numeric_settings_are_ignored() {
    let mut t = table(vec![SettingDefinition::new("machine_name", SettingType::String)
        .with_value("'Ender'")
        .with_minimum("1")]);

    let diagnostics = t.resolve();
    assert_eq!(t.get_value("machine_name"), Some(&SettingValue::string("Ender")));
    assert!(diagnostics.contains("machine_name", DiagnosticKind::TypeCoercion));
    assert!(!diagnostics.has_errors());
}

#[test]
fn test_enabled_sees_new_values() {
    let mut t = table(vec![
        SettingDefinition::bool("support_enable").with_default(false),
        SettingDefinition::float("support_angle")
            .with_default(50.0)
            .with_enabled("support_enable"),
        SettingDefinition::float("support_z_distance")
            .with_default(0.2)
            .with_enabled("missing_key"),
    ]);

    let diagnostics = t.resolve();
    assert_eq!(t.is_enabled("support_angle"), Some(false));

    // Failing enabled formulas keep the previous flag
    assert_eq!(t.is_enabled("support_z_distance"), Some(true));
    let errors: Vec<_> = diagnostics.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].role, Some(ExpressionRole::Enabled));

    t.resolve_with([("support_enable", true)]);
    assert_eq!(t.is_enabled("support_angle"), Some(true));
}

#[test]
fn test_clone_shares_plan_but_not_values() {
    let mut original = printer_profile();
    original.resolve();

    let mut copy = original.clone();
    assert!(copy.shares_plan_with(&original));

    copy.resolve_with([("nozzle_diameter", 0.6)]);
    copy.resolve();
    assert_eq!(float(&copy, "line_width"), 0.6);
    assert_eq!(float(&original, "line_width"), 0.4);
    assert!(copy.shares_plan_with(&original));
}

#[test]
fn test_tables_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SettingsTable>();
    assert_send_sync::<DiagnosticList>();
}

#[test]
fn test_resolve_tables_on_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let mut t = printer_profile();
                t.resolve_with([("nozzle_diameter", 0.2 * (i + 1) as f64)]);
                t.resolve();
                float(&t, "line_width")
            })
        })
        .collect();

    let widths: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(widths, vec![0.2, 0.4, 0.6000000000000001, 0.8]);
}
