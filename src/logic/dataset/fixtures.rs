//! Synthetic churn data shaped like the bigml telecom dataset

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::logic::features::{FeatureRow, FeatureValue};

pub(crate) const HEADER: [&str; 20] = [
    "State",
    "Account length",
    "Area code",
    "International plan",
    "Voice mail plan",
    "Number vmail messages",
    "Total day minutes",
    "Total day calls",
    "Total day charge",
    "Total eve minutes",
    "Total eve calls",
    "Total eve charge",
    "Total night minutes",
    "Total night calls",
    "Total night charge",
    "Total intl minutes",
    "Total intl calls",
    "Total intl charge",
    "Customer service calls",
    "Churn",
];

pub(crate) const STATES: [&str; 5] = ["CA", "KS", "NY", "OH", "TX"];

pub(crate) fn churn_csv(rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = HEADER.join(",");
    out.push('\n');

    for i in 0..rows {
        // cycle states so every split sees all of them
        let state = STATES[i % STATES.len()];
        let area = [408, 415, 510][rng.gen_range(0..3)];
        let intl_plan = rng.gen_bool(0.2);
        let vmail_plan = rng.gen_bool(0.3);
        let vmail_messages = if vmail_plan { rng.gen_range(10..40) } else { 0 };
        let day_minutes: f64 = rng.gen_range(80.0..320.0);
        let eve_minutes: f64 = rng.gen_range(80.0..300.0);
        let night_minutes: f64 = rng.gen_range(80.0..300.0);
        let intl_minutes: f64 = rng.gen_range(2.0..18.0);
        let service_calls = rng.gen_range(0..7);

        let churn = service_calls >= 4
            || day_minutes > 280.0
            || (intl_plan && intl_minutes > 13.0);

        let yes_no = |b: bool| if b { "Yes" } else { "No" };

        out.push_str(&format!(
            "{},{},{},{},{},{},{:.1},{},{:.2},{:.1},{},{:.2},{:.1},{},{:.2},{:.1},{},{:.2},{},{}\n",
            state,
            rng.gen_range(1..200),
            area,
            yes_no(intl_plan),
            yes_no(vmail_plan),
            vmail_messages,
            day_minutes,
            rng.gen_range(50..150),
            day_minutes * 0.17,
            eve_minutes,
            rng.gen_range(50..150),
            eve_minutes * 0.085,
            night_minutes,
            rng.gen_range(50..150),
            night_minutes * 0.045,
            intl_minutes,
            rng.gen_range(1..10),
            intl_minutes * 0.27,
            service_calls,
            if churn { "True" } else { "False" },
        ));
    }

    out
}

pub(crate) fn write_churn_csv(dir: &Path, name: &str, rows: usize, seed: u64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, churn_csv(rows, seed)).unwrap();
    path
}

/// A complete, well-formed client record
pub(crate) fn known_good_record() -> FeatureRow {
    let mut row = FeatureRow::new();
    let mut put = |k: &str, v: FeatureValue| {
        row.insert(k.to_string(), v);
    };

    put("State", FeatureValue::Text("NY".into()));
    put("Account length", FeatureValue::Number(100.0));
    put("Area code", FeatureValue::Number(408.0));
    put("International plan", FeatureValue::Text("no".into()));
    put("Voice mail plan", FeatureValue::Text("no".into()));
    put("Number vmail messages", FeatureValue::Number(0.0));
    put("Total day minutes", FeatureValue::Number(200.0));
    put("Total day calls", FeatureValue::Number(100.0));
    put("Total day charge", FeatureValue::Number(34.0));
    put("Total eve minutes", FeatureValue::Number(200.0));
    put("Total eve calls", FeatureValue::Number(100.0));
    put("Total eve charge", FeatureValue::Number(17.0));
    put("Total night minutes", FeatureValue::Number(200.0));
    put("Total night calls", FeatureValue::Number(100.0));
    put("Total night charge", FeatureValue::Number(9.0));
    put("Total intl minutes", FeatureValue::Number(10.0));
    put("Total intl calls", FeatureValue::Number(4.0));
    put("Total intl charge", FeatureValue::Number(2.7));
    put("Customer service calls", FeatureValue::Number(1.0));

    row
}
