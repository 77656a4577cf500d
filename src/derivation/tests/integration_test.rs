//! Integration Tests - End-to-end derivation scripts
//!
//! This module contains integration tests that verify:
//! - The reference derivation extracts the expected scheme
//! - Extracted schemes can be instantiated again
//! - Mixed universal/existential extraction
//! - Error reporting across parsing and running

use crate::derivation::{parse_derivation, run_derivation, RunReport};
use crate::types::Variable;

/// Helper to parse and run a script that is expected to parse
fn run(source: &str) -> RunReport {
    let derivation = parse_derivation(source).unwrap();
    run_derivation(&derivation)
}

const REFERENCE: &str = include_str!("../../../demos/reference.deriv");

#[test]
fn test_reference_derivation() {
    let report = run(REFERENCE);
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.extractions.len(), 1);
    assert_eq!(report.extractions[0].line, 10);
    assert_eq!(
        report.extractions[0].scheme.to_string(),
        "exists<lt J, lt I, lt K, lt L> { J <= K, I <= K, K <= L } => (&I i32, &J i32)"
    );

    assert_eq!(
        report.env.to_string(),
        "forall ty T, exists ty A, exists ty B, exists lt I, exists lt J, exists lt K, exists lt L\n\
         A = &I i32\n\
         B = &J i32\n\
         I <= K\n\
         J <= K\n\
         K <= L"
    );
}

#[test]
fn test_reference_derivation_is_deterministic() {
    let first = run(REFERENCE);
    let second = run(REFERENCE);
    assert_eq!(first.extractions, second.extractions);
    assert_eq!(first.env, second.env);
}

#[test]
fn test_extracted_scheme_instantiates_again() {
    let report = run(
        r#"
instantiate exists<lt I, lt K> { I <= K } => (&I i32)
extract (&I i32)
instantiate exists<lt I, lt K> { I <= K } => (&I i32)
extract (&I i32)
expect exists<lt a, lt b> { a <= b } => (&a i32)
"#,
    );
    assert!(report.is_success(), "{:?}", report.errors);

    let schemes: Vec<_> = report.schemes().collect();
    assert_eq!(schemes[0].to_string(), "exists<lt I, lt K> { I <= K } => (&I i32)");
    assert_eq!(schemes[1].to_string(), "exists<lt I_0, lt K_1> { I_0 <= K_1 } => (&I_0 i32)");
    assert!(schemes[0].alpha_eq(schemes[1]));
}

#[test]
fn test_universal_variables_come_first() {
    let report = run(
        r#"
instantiate forall<lt a>
instantiate exists<lt I, ty X>
relate I >= a
bind X = &I u8
extract (X, a)
"#,
    );
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(
        report.extractions[0].scheme.to_string(),
        "forall<lt a> exists<lt I> { I >= a } => (&I u8, a)"
    );
}

#[test]
fn test_bound_variable_relations_are_dropped() {
    let report = run(
        r#"
instantiate exists<lt I, lt K>
relate I <= K
bind K = static
extract (&I i32, &K i32)
expect exists<lt I> => (&I i32, &static i32)
"#,
    );
    assert!(report.is_success(), "{:?}", report.errors);
}

#[test]
fn test_nested_scheme_shadowing() {
    let report = run(
        r#"
instantiate forall<ty T> exists<ty T> => (T)
extract (T)
"#,
    );
    assert!(report.is_success(), "{:?}", report.errors);

    // `T` now names the inner, existential variable
    let declared: Vec<_> = report.env.variables().iter().map(|d| d.var.name.as_str()).collect();
    assert_eq!(declared, vec!["T", "T_0"]);
    assert_eq!(report.extractions[0].scheme.to_string(), "exists<ty T_0> => (T_0)");
}

#[test]
fn test_malformed_scheme_reports_and_stops() {
    let report = run(
        r#"
instantiate exists<lt I, lt I>
instantiate exists<lt J>
"#,
    );
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].line, 2);
    assert_eq!(report.errors[0].kind.code(), "E003");
    assert!(report.env.variables().is_empty());
}

#[test]
fn test_unknown_and_cyclic_bindings() {
    let report = run(
        r#"
instantiate exists<ty A>
bind A = Missing
"#,
    );
    assert_eq!(report.errors[0].kind.code(), "E001");

    let report = run(
        r#"
instantiate exists<ty A, ty B>
bind A = Vec<B>
bind B = (A, i32)
"#,
    );
    assert_eq!(report.errors[0].line, 4);
    assert_eq!(report.errors[0].kind.code(), "E005");
    assert!(!report.env.is_bound(&Variable::ty("B")));
}

#[test]
fn test_parse_errors_prevent_running() {
    let errors = parse_derivation("instantiate exists<lt I>\nrelate I => K\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 2);
    assert_eq!(errors[0].column, 10);
}
