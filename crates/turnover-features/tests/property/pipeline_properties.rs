#[path = "../common/mod.rs"]
mod common;

use common::{pipeline_with, turnover_record, MockClassifier};
use proptest::prelude::*;
use std::sync::Arc;
use turnover_core::{Error, Record, Value};
use turnover_features::deriver::bin_index;
use turnover_features::{
    BinClosed, DerivationMode, DerivationRule, EncodingStrategy, Operand, Profile,
};

const PROFESSIONS: &[&str] = &["clerk", "engineer", "manager", "sales", "technician", "worker"];
const INDUSTRIES: &[&str] = &["Finance", "HR", "IT", "Manufacturing", "Retail"];
const WAYS: &[&str] = &["bike", "car", "public", "walk"];
const COACHES: &[&str] = &["my head", "no", "yes"];

fn turnover_record_strategy() -> impl Strategy<Value = Vec<(&'static str, Value)>> {
    (
        (18i64..70, 0i64..240, 1.0f64..10.0, 1.0f64..10.0, 1.0f64..10.0),
        (
            0usize..COACHES.len(),
            0usize..PROFESSIONS.len(),
            0usize..INDUSTRIES.len(),
            0usize..WAYS.len(),
        ),
    )
        .prop_map(|((age, stag, anxiety, selfcontrol, novator), (c, p, i, w))| {
            vec![
                ("age", Value::Int(age)),
                ("stag", Value::Int(stag)),
                ("anxiety", Value::Float(anxiety)),
                ("selfcontrol", Value::Float(selfcontrol)),
                ("novator", Value::Float(novator)),
                ("coach", Value::from(COACHES[c])),
                ("profession", Value::from(PROFESSIONS[p])),
                ("industry", Value::from(INDUSTRIES[i])),
                ("way", Value::from(WAYS[w])),
            ]
        })
}

fn static_encoding() -> EncodingStrategy {
    let table = Profile::builtin("turnover").unwrap().encoding;
    EncodingStrategy::select(table, None).unwrap()
}

proptest! {
    #[test]
    fn vector_always_matches_schema(overrides in turnover_record_strategy()) {
        let pipeline = pipeline_with(
            "turnover",
            Arc::new(MockClassifier::for_profile("turnover")),
            DerivationMode::Compute,
        );
        let features = pipeline.features(&turnover_record(&overrides)).unwrap();

        prop_assert_eq!(features.columns(), &pipeline.context().schema()[..]);
        prop_assert!(features.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn risk_flags_never_both_set(overrides in turnover_record_strategy()) {
        let pipeline = pipeline_with(
            "turnover",
            Arc::new(MockClassifier::for_profile("turnover")),
            DerivationMode::Compute,
        );
        let features = pipeline.features(&turnover_record(&overrides)).unwrap();

        let low = features.get("low_risk").unwrap();
        let high = features.get("high_risk").unwrap();
        prop_assert!(low + high <= 1.0, "low_risk={} high_risk={}", low, high);
    }

    #[test]
    fn encoding_is_idempotent(overrides in turnover_record_strategy()) {
        let encoding = static_encoding();
        let mut once = Record::from(&turnover_record(&overrides));
        encoding.encode(&mut once).unwrap();

        let mut twice = once.clone();
        encoding.encode(&mut twice).unwrap();

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn unknown_category_is_rejected(category in "[a-z]{1,12}") {
        prop_assume!(!INDUSTRIES.contains(&category.as_str()));

        let mut record = Record::from(&turnover_record(&[("industry", Value::from(category))]));
        let result = static_encoding().encode(&mut record);
        let is_unknown = matches!(result, Err(Error::UnknownCategory { .. }));
        prop_assert!(is_unknown);
    }

    #[test]
    fn ratio_never_divides_by_zero(numerator in -1e6f64..1e6, denominator in -100i64..100, offset in -2i64..2) {
        let rule = DerivationRule::Ratio {
            name: "ratio".to_string(),
            numerator: Operand::Field("n".to_string()),
            denominator: Operand::Field("d".to_string()),
            offset: offset as f64,
        };
        let mut record = Record::new();
        record.insert("n", numerator);
        record.insert("d", denominator);

        let value = rule.evaluate(&record).unwrap();
        if denominator + offset == 0 {
            prop_assert_eq!(value, Value::Missing);
        } else {
            prop_assert!(value.as_f64().is_some_and(f64::is_finite));
        }
    }

    #[test]
    fn left_closed_bins_cover_their_range(value in 18.0f64..=100.0) {
        let edges = [18.0, 25.0, 35.0, 45.0, 60.0, 100.0];
        let idx = bin_index(value, &edges, BinClosed::Left).unwrap();

        prop_assert!(edges[idx] <= value);
        prop_assert!(value < edges[idx + 1] || (idx == edges.len() - 2 && value == edges[idx + 1]));
    }
}
