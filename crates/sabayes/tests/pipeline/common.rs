//! Synthetic census tables shared by the pipeline tests.

use std::fmt::Write as _;
use std::path::Path;

use sabayes::{DerivedColumn, HierarchySpec, LevelSpec, PipelineConfig, SamplerConfig, TableSchema};

/// Five-digit area codes: one region digit, two district digits, two area
/// digits.
pub fn hierarchy() -> HierarchySpec {
    HierarchySpec {
        area: LevelSpec::new("area", 5),
        levels: vec![LevelSpec::new("region", 1), LevelSpec::new("district", 3)],
    }
}

/// Codes of the 30 areas present in every table: 2 regions × 3 districts ×
/// 5 areas.
pub fn area_codes() -> Vec<String> {
    let mut codes = Vec::new();
    for region in 1..=2 {
        for district in 0..3 {
            for area in 0..5 {
                codes.push(format!("{region}{district:02}{area:02}"));
            }
        }
    }
    codes
}

/// Area present in the income table only.
pub const INCOME_ONLY: &str = "29901";

/// Area missing from the tenure table.
pub const NO_TENURE: &str = "20204";

/// Area whose rent is suppressed with a sentinel.
pub const SUPPRESSED_RENT: &str = "10102";

/// Write `g02.csv` (income, rent) and `g37.csv` (tenure counts) into `dir`.
///
/// Rent rises with income and renter share, plus a district effect. The
/// income table carries a footnote row without a code, a suppressed rent,
/// a non-numeric income and a thousands separator. One area has zero
/// dwellings.
pub fn write_tables(dir: &Path) {
    let mut g02 = String::from("SA1_CODE_2021,Median_tot_hhd_inc_weekly,Median_rent_weekly\n");
    let mut g37 = String::from("SA1_CODE_2021,Rented,Total_dwellings\n");

    for (i, code) in area_codes().iter().enumerate() {
        let district = i / 5;
        let slot = i % 5;
        let income = 900.0 + ((i * 7) % 11) as f64 * 120.0 + district as f64 * 40.0;
        let dwellings = 100 + (i * 13) % 40;
        let rented = 20 + (i * 17) % 50;
        let share = 100.0 * rented as f64 / dwellings as f64;
        let rent = 150.0 + 0.25 * income + 1.5 * share + 20.0 * district as f64 + slot as f64;

        let income_cell = if i == 12 {
            "\"1,620\"".to_string()
        } else if i == 20 {
            "n/a".to_string()
        } else {
            format!("{income}")
        };
        let rent_cell = if code == SUPPRESSED_RENT {
            "..".to_string()
        } else {
            format!("{rent:.0}")
        };
        writeln!(g02, "{code},{income_cell},{rent_cell}").unwrap();

        if code == NO_TENURE {
            continue;
        }
        let dwellings = if i == 3 { 0 } else { dwellings };
        writeln!(g37, "{code},{rented},{dwellings}").unwrap();
    }
    writeln!(g02, "{INCOME_ONLY},1400,410").unwrap();
    writeln!(g02, ",Source: synthetic census,").unwrap();

    std::fs::write(dir.join("g02.csv"), g02).unwrap();
    std::fs::write(dir.join("g37.csv"), g37).unwrap();
}

/// Configuration over [`write_tables`] with short chains.
pub fn config() -> PipelineConfig {
    PipelineConfig::new("median_rent")
        .with_table(
            TableSchema::new("g02", "g02.csv", "SA1_CODE_2021")
                .field("median_income", "Median_tot_hhd_inc_weekly")
                .field("median_rent", "Median_rent_weekly"),
        )
        .with_table(
            TableSchema::new("g37", "g37.csv", "SA1_CODE_2021")
                .field("rented", "Rented")
                .field("dwellings", "Total_dwellings"),
        )
        .with_derived(DerivedColumn::ratio("renter_share", &["rented"], &["dwellings"]).scaled(100.0))
        .with_predictors(["median_income", "renter_share"])
        .with_hierarchy(hierarchy())
        .with_neighbours(4)
        .with_sampler(short_sampler())
}

/// Two short chains.
pub fn short_sampler() -> SamplerConfig {
    SamplerConfig::new().chains(2).tune(150).draws(150).seed(2021)
}
