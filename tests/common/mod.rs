#![allow(dead_code)]

use std::fs;
use std::path::Path;

use taxbrain::{BehaviorParams, Calculator, BehavioralResponse, PolicyState, Snapshot, TaxEngine};

pub const INCOME_COLUMNS: [&str; 9] = [
    "e00200", "p22250", "p23250", "e00600", "e00300", "e00400", "e01100", "e01200", "e02000",
];

/// Flat tax above an exemption, plus a payroll tax on wages.
///
/// Parameters: `II_em` (exemption, default 5000), `II_rt1` (rate, default
/// 0.15), `PT_rt` (payroll rate, default 0.153). Interacting `II_em` and
/// `II_rt1` changes make stacked attribution order-dependent.
pub struct ToyEngine;

impl TaxEngine for ToyEngine {
    fn compute(&self, policy: &PolicyState, year: i32, table: &mut Snapshot) -> Result<(), String> {
        let exemption = policy.f64_at("II_em", year).unwrap_or(5_000.0);
        let rate = policy.f64_at("II_rt1", year).unwrap_or(0.15);
        let payroll_rate = policy.f64_at("PT_rt", year).unwrap_or(0.153);
        if !(0.0..=1.0).contains(&rate) {
            return Err(format!("II_rt1 {rate} is outside [0, 1]"));
        }

        let rows = table.len();
        let mut income = vec![0.0; rows];
        for column in INCOME_COLUMNS {
            if let Ok(values) = table.column(column) {
                for (acc, v) in income.iter_mut().zip(values) {
                    *acc += v;
                }
            }
        }
        let wages = table.column("e00200").map_err(|e| e.to_string())?.to_vec();
        let iitax: Vec<f64> = income.iter().map(|x| (x - exemption).max(0.0) * rate).collect();
        let payroll: Vec<f64> = wages.iter().map(|w| w * payroll_rate).collect();
        let combined = iitax.iter().zip(&payroll).map(|(i, p)| i + p).collect();

        table.set_column("iitax", iitax).map_err(|e| e.to_string())?;
        table.set_column("payrolltax", payroll).map_err(|e| e.to_string())?;
        table.set_column("combined", combined).map_err(|e| e.to_string())?;
        table.set_column("expanded_income", income).map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Shrinks reform wages by `sub` times the change in tax rate, then computes
/// both sides.
pub struct ToyResponse;

impl BehavioralResponse for ToyResponse {
    fn respond(
        &self,
        mut base: Calculator,
        mut reform: Calculator,
        params: &BehaviorParams,
    ) -> Result<(Snapshot, Snapshot), String> {
        let sub = params.get("sub").unwrap_or(0.0);
        let year = reform.current_year();
        let base_rate = base.policy().f64_at("II_rt1", year).unwrap_or(0.15);
        let reform_rate = reform.policy().f64_at("II_rt1", year).unwrap_or(0.15);
        let wages = reform.array("e00200").map_err(|e| e.to_string())?.to_vec();
        let delta: Vec<f64> = wages.iter().map(|w| -w * sub * (reform_rate - base_rate)).collect();
        reform.increment_column("e00200", &delta).map_err(|e| e.to_string())?;

        base.calc_all().map_err(|e| e.to_string())?;
        reform.calc_all().map_err(|e| e.to_string())?;
        Ok((base.table().clone(), reform.table().clone()))
    }
}

/// Deterministic synthetic microdata with every incidence income column.
pub fn synthetic_csv(rows: usize) -> String {
    let mut out = String::from("RECID,s006,e00200,e00200p,e00200s,p22250,p23250,e00600,e00650,e00300,e00400,e01100,e01200,e02000\n");
    for i in 0..rows {
        let k = i as f64;
        let wages = (k * 3_517.0) % 400_000.0;
        let cap = if i % 4 == 0 { (k * 911.0) % 60_000.0 } else { 0.0 };
        let interest = (k * 37.0) % 2_000.0;
        out.push_str(&format!(
            "{i},{w},{wages},{wp},{ws},{cap},{lt},{div},{qdiv},{interest},0,0,{rent},{sch_e}\n",
            w = 100.0 + (i % 7) as f64 * 10.0,
            wp = wages * 0.6,
            ws = wages * 0.4,
            lt = cap * 0.5,
            div = cap * 0.2,
            qdiv = cap * 0.1,
            rent = if i % 9 == 0 { 1_200.0 } else { 0.0 },
            sch_e = if i % 5 == 0 { 3_000.0 } else { 0.0 },
        ));
    }
    out
}

pub fn write_csv(dir: &Path, name: &str, rows: usize) {
    fs::write(dir.join(name), synthetic_csv(rows)).unwrap();
}

pub fn write_zst(dir: &Path, name: &str, rows: usize) {
    let compressed = zstd::encode_all(synthetic_csv(rows).as_bytes(), 3).unwrap();
    fs::write(dir.join(name), compressed).unwrap();
}
