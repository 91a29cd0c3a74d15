//! Streaming and bulk feature paths over the same bars.

mod common;

use approx::assert_relative_eq;
use barwise::adapters::csv_adapter::{self, CsvBarSource};
use barwise::domain::bar::RawBar;
use barwise::domain::error::BarwiseError;
use barwise::domain::feature::{ops, FeatureEngine, FeatureLogic, FeatureTable, SpecFeatureLogic};
use barwise::ports::bar_source::IterSource;
use common::*;
use proptest::prelude::*;
use std::fs;

/// close, 3-row SMA and one-row lag, written by hand against the table API.
#[derive(Debug, Clone)]
struct SimpleLogic;

impl FeatureLogic for SimpleLogic {
    fn min_bars(&self) -> usize {
        3
    }

    fn feature_names(&self) -> Vec<String> {
        vec!["close".into(), "sma3".into(), "lag1".into()]
    }

    fn compute(&self, table: &mut FeatureTable) -> Result<(), BarwiseError> {
        let close = table.require("close")?.to_vec();
        table.set_column("sma3", ops::rolling_mean(&close, 3))?;
        table.set_column("lag1", ops::shift(&close, 1))?;
        Ok(())
    }
}

fn raw(closes: &[f64]) -> Vec<RawBar> {
    make_bars(closes).iter().map(RawBar::from).collect()
}

mod end_to_end {
    use super::*;

    const CLOSES: [f64; 5] = [100.0, 101.0, 102.0, 103.0, 104.0];

    #[test]
    fn streaming_and_bulk_vectors_match() {
        let bars = make_bars(&CLOSES);
        let mut engine = FeatureEngine::new(SimpleLogic, None).unwrap();
        let streamed = engine
            .stream_from_source(&mut IterSource::new(bars.clone()))
            .unwrap();
        let bulk = engine.compute_bulk(&raw(&CLOSES)).unwrap();

        assert_eq!(streamed, bulk);
        assert_eq!(streamed.len(), 3);

        let times: Vec<_> = streamed.iter().map(|v| v.time).collect();
        assert_eq!(times, vec![bars[2].time, bars[3].time, bars[4].time]);

        let sma: Vec<f64> = streamed.iter().map(|v| v.get("sma3").unwrap()).collect();
        let lag: Vec<f64> = streamed.iter().map(|v| v.get("lag1").unwrap()).collect();
        let close: Vec<f64> = streamed.iter().map(|v| v.get("close").unwrap()).collect();
        assert_eq!(sma, vec![101.0, 102.0, 103.0]);
        assert_eq!(lag, vec![101.0, 102.0, 103.0]);
        assert_eq!(close, vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn spec_logic_matches_hand_written_logic() {
        let logic = SpecFeatureLogic::parse("close, sma(3), lag(1)").unwrap();
        let spec_engine = FeatureEngine::new(logic, None).unwrap();
        let hand_engine = FeatureEngine::new(SimpleLogic, None).unwrap();

        let from_spec = spec_engine.compute_bulk(&raw(&CLOSES)).unwrap();
        let by_hand = hand_engine.compute_bulk(&raw(&CLOSES)).unwrap();

        assert_eq!(from_spec.len(), by_hand.len());
        for (a, b) in from_spec.iter().zip(&by_hand) {
            assert_eq!(a.get("sma3"), b.get("sma3"));
            assert_eq!(a.get("lag1"), b.get("lag1"));
        }
    }

    #[test]
    fn verify_reports_compared_rows() {
        let engine = FeatureEngine::new(SimpleLogic, Some(3)).unwrap();
        assert_eq!(engine.verify_equivalence(&raw(&CLOSES)).unwrap(), 3);
    }

    #[test]
    fn csv_file_streams_like_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        fs::write(&path, bars_csv(&make_bars(&CLOSES))).unwrap();

        let mut engine = FeatureEngine::new(SimpleLogic, None).unwrap();
        let mut source = CsvBarSource::from_path(&path, None).unwrap();
        let from_file = engine.stream_from_source(&mut source).unwrap();

        let rows = csv_adapter::read_raw_file(&path, None).unwrap();
        let bulk = engine.compute_bulk(&rows).unwrap();
        assert_eq!(from_file, bulk);
    }
}

mod warm_up {
    use super::*;

    #[test]
    fn extract_gated_until_min_bars() {
        let mut engine = FeatureEngine::new(SimpleLogic, None).unwrap();
        let bars = make_bars(&[1.0, 2.0, 3.0]);

        engine.update(&bars[0]).unwrap();
        assert!(!engine.ready());
        assert!(matches!(
            engine.extract(),
            Err(BarwiseError::NotReady { have: 1, need: 3 })
        ));

        engine.update(&bars[1]).unwrap();
        assert!(matches!(
            engine.extract(),
            Err(BarwiseError::NotReady { have: 2, need: 3 })
        ));

        engine.update(&bars[2]).unwrap();
        let v = engine.extract().unwrap();
        assert_relative_eq!(v.get("sma3").unwrap(), 2.0);
    }

    #[test]
    fn short_history_yields_no_vectors() {
        let engine = FeatureEngine::new(SimpleLogic, None).unwrap();
        assert!(engine.compute_bulk(&raw(&[1.0, 2.0])).unwrap().is_empty());
        assert_eq!(engine.verify_equivalence(&raw(&[1.0, 2.0])).unwrap(), 0);
    }

    #[test]
    fn window_below_min_bars_rejected() {
        let err = FeatureEngine::new(SimpleLogic, Some(2)).unwrap_err();
        assert!(matches!(err, BarwiseError::UnsupportedConfig { .. }));
    }
}

const ALL_FEATURES: &str = "close, sma(3), ema(5), lag(2), stddev(4), roc(3), atr(5), rsi(4)";
const FINITE_MEMORY: &str = "close, sma(3), lag(2), stddev(4), roc(3)";

fn closes_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..1000.0, 0..60)
}

proptest! {
    #[test]
    fn streaming_equals_bulk(closes in closes_strategy()) {
        let logic = SpecFeatureLogic::parse(ALL_FEATURES).unwrap();
        let min_bars = logic.min_bars();
        let engine = FeatureEngine::new(logic, None).unwrap();

        let compared = engine.verify_equivalence(&raw(&closes)).unwrap();
        prop_assert_eq!(compared, (closes.len() + 1).saturating_sub(min_bars));
    }

    #[test]
    fn bulk_rows_ignore_later_bars(
        closes in prop::collection::vec(1.0f64..1000.0, 8..60),
        pick in any::<prop::sample::Index>(),
        replacement in 1.0f64..1000.0,
    ) {
        let logic = SpecFeatureLogic::parse(ALL_FEATURES).unwrap();
        let offset = logic.min_bars() - 1;
        let engine = FeatureEngine::new(logic, None).unwrap();

        let k = pick.index(closes.len());
        let mut changed = closes.clone();
        changed[k] = replacement;

        let before = engine.compute_bulk(&raw(&closes)).unwrap();
        let after = engine.compute_bulk(&raw(&changed)).unwrap();
        for i in 0..before.len() {
            if offset + i < k {
                prop_assert_eq!(&before[i], &after[i]);
            }
        }
    }

    #[test]
    fn retention_window_keeps_finite_memory_features(
        closes in prop::collection::vec(1.0f64..1000.0, 0..60),
        extra in 0usize..4,
    ) {
        let logic = SpecFeatureLogic::parse(FINITE_MEMORY).unwrap();
        let window = logic.min_bars() + extra;
        let mut bounded = FeatureEngine::new(logic.clone(), Some(window)).unwrap();
        let mut unbounded = FeatureEngine::new(logic, None).unwrap();

        for bar in make_bars(&closes) {
            bounded.update(&bar).unwrap();
            unbounded.update(&bar).unwrap();
            prop_assert!(bounded.len() <= window);
            prop_assert_eq!(bounded.ready(), unbounded.ready());
            if unbounded.ready() {
                prop_assert_eq!(bounded.extract().unwrap(), unbounded.extract().unwrap());
            }
        }
    }
}
