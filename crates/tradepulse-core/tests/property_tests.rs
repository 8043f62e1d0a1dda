use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tradepulse_core::property::price_target::{
    solve_price_target, Enrichment, EnrichmentModel, PriceTargetInput, PriceTargetSolver,
    SolverSettings,
};
use tradepulse_core::property::rental::{
    analyze_rental_property, RentalPropertyInput, RentalPropertyModel, TaxRegime,
};
use tradepulse_core::{TradePulseError, TradePulseResult};

fn studio() -> RentalPropertyInput {
    serde_json::from_str(
        r#"{
            "price": "150000",
            "down_payment": "12000",
            "loan_rate": "0.036",
            "loan_duration_months": 300,
            "loan_insurance_rate": "0.0025",
            "monthly_rent": "750",
            "vacancy_rate": "0.05",
            "monthly_charges": "60",
            "property_tax": "800",
            "marginal_rate": "0.30",
            "tax_regime": "lmnp_micro_bic"
        }"#,
    )
    .unwrap()
}

// ===========================================================================
// Rental model
// ===========================================================================

#[test]
fn test_rental_defaults_applied() {
    let input = studio();
    assert_eq!(input.notary_fee_rate, dec!(0.08));
    assert_eq!(input.tax_regime, TaxRegime::LmnpMicroBic);

    let year = analyze_rental_property(&input).unwrap().result;
    assert_eq!(year.total_cost, dec!(162000));
    assert_eq!(year.loan_amount, dec!(150000));
    assert_eq!(year.collected_rent, dec!(8550));
    // 8,550 * 0.5 * 0.472
    assert_eq!(year.tax, dec!(2017.8));
    assert_eq!(year.annual_insurance, dec!(375));
}

#[test]
fn test_regimes_ordered_by_tax() {
    let tax_for = |regime| {
        let mut input = studio();
        input.tax_regime = regime;
        analyze_rental_property(&input).unwrap().result.tax
    };
    let micro_foncier = tax_for(TaxRegime::MicroFoncier);
    let micro_bic = tax_for(TaxRegime::LmnpMicroBic);
    let lmnp_reel = tax_for(TaxRegime::LmnpReel);

    assert!(micro_foncier > micro_bic);
    assert!(micro_bic > lmnp_reel);
}

// ===========================================================================
// Price target
// ===========================================================================

#[test]
fn test_break_even_price_for_studio() {
    let input = PriceTargetInput {
        property: studio(),
        target_enrichment: Decimal::ZERO,
        settings: SolverSettings::default(),
    };
    let result = solve_price_target(&input).unwrap();
    let out = &result.result;

    assert!(out.feasible);
    assert!(out.converged, "warnings: {:?}", result.warnings);
    assert!(out.iterations <= 80);
    assert!(out.enrichment_at_target.abs() <= dec!(1));
    assert_eq!(out.gap, out.current_price - out.target_price);

    // Re-evaluating the model at the solved price reproduces the enrichment.
    let model = RentalPropertyModel::new(studio()).unwrap();
    let check = model.enrichment(out.target_price).unwrap();
    assert_eq!(check, out.breakdown_target);
}

#[test]
fn test_unreachable_target_is_reported_not_raised() {
    let input = PriceTargetInput {
        property: studio(),
        target_enrichment: dec!(100000),
        settings: SolverSettings::default(),
    };
    let result = solve_price_target(&input).unwrap();
    assert!(!result.result.feasible);
    assert_eq!(result.result.target_price, dec!(45000));
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_custom_model_with_shared_solver() {
    struct Linear {
        slope: Decimal,
    }

    impl EnrichmentModel for Linear {
        fn enrichment(&self, price: Decimal) -> TradePulseResult<Enrichment> {
            Ok(Enrichment {
                cash_flow: dec!(30000) - price * self.slope,
                capital_repaid: dec!(5000),
            })
        }
    }

    let solver = PriceTargetSolver::new(Linear { slope: dec!(0.125) }).with_memoization();
    let first = solver.solve(dec!(250000), dec!(5000)).unwrap();
    assert!(first.converged);
    assert!((first.target_price - dec!(240000)).abs() <= dec!(8));

    let cached = solver.solve(dec!(250000), dec!(5000)).unwrap();
    assert_eq!(cached.iterations, first.iterations);
    assert_eq!(solver.model().slope, dec!(0.125));
}

#[test]
fn test_percent_style_loan_rate_is_rejected() {
    let mut property = studio();
    property.loan_rate = dec!(3.5);

    let input = PriceTargetInput {
        property: property.clone(),
        target_enrichment: Decimal::ZERO,
        settings: SolverSettings::default(),
    };
    match solve_price_target(&input).unwrap_err() {
        TradePulseError::InvalidInput { field, .. } => assert_eq!(field, "loan_rate"),
        other => panic!("Expected InvalidInput, got {:?}", other),
    }
    assert!(analyze_rental_property(&property).is_err());
}
