use super::*;
use crate::impact::{KeyPlayerImpact, NoImpact};
use assert_float_eq::*;
use sdm::file::read_json;
use serde_json::{json, Value};

const RESOURCES: &str = "resources/test";

fn record(id: u64, day: u8, home: (u64, &str), away: (u64, &str), goals: (Option<u8>, Option<u8>)) -> Value {
    json!({
        "fixture": { "id": id, "date": format!("2024-02-0{day}T19:30:00Z") },
        "league": { "id": 7 },
        "teams": {
            "home": { "id": home.0, "name": home.1 },
            "away": { "id": away.0, "name": away.1 }
        },
        "goals": { "home": goals.0, "away": goals.1 }
    })
}

fn with_xg(mut record: Value, home: f64, away: f64) -> Value {
    record["stats"] = json!({ "home": { "expected_goals": home }, "away": { "expected_goals": away } });
    record
}

/// Four played contests between two teams and one unplayed, listed out of order.
fn three_contest_records() -> Vec<Value> {
    const A: (u64, &str) = (1, "A");
    const B: (u64, &str) = (2, "B");
    let mut priced = record(3, 3, A, B, (Some(0), Some(2)));
    priced["odds"] = json!({
        "markets": [
            { "name": "Double Chance", "values": [{ "value": "1X", "odd": 1.5 }, { "value": "X2", "odd": 2.6 }] },
            { "name": "O/U 2.5", "values": [{ "value": "Over 2.5", "odd": 2.1 }, { "value": "Under 2.5", "odd": 1.75 }] },
            { "name": "Both Teams Score", "values": [{ "value": "Yes", "odd": 1.9 }, { "value": "No", "odd": 1.9 }] }
        ]
    });
    vec![
        with_xg(record(4, 3, B, A, (Some(3), Some(0))), 2.5, 0.4),
        with_xg(record(2, 2, B, A, (Some(1), Some(1))), 1.2, 1.4),
        record(5, 4, A, B, (None, None)),
        with_xg(record(1, 1, A, B, (Some(2), Some(1))), 1.8, 0.9),
        priced,
    ]
}

fn three_contest_ratings() -> RatingArchive {
    let mut ratings = RatingArchive::default();
    ratings.insert(7, crate::rating::DEFAULT_ROUND, "A", 1550.0);
    ratings
}

fn three_contest_config() -> BacktestConfig {
    BacktestConfig {
        model: ModelConfig {
            min_matches: 1,
            ..ModelConfig::default()
        },
        collect_traces: true,
        ..BacktestConfig::default()
    }
}

fn run_three_contests() -> Report {
    let dataset = Dataset::from_values(&three_contest_records());
    let ratings = three_contest_ratings();
    Backtest::new(three_contest_config(), &ratings, KeyPlayerImpact::default()).run(&dataset)
}

fn trace(report: &Report, contest: FixtureId) -> &ContestTrace {
    report
        .traces
        .as_ref()
        .unwrap()
        .iter()
        .find(|trace| trace.contest == contest)
        .unwrap()
}

fn pick(trace: &ContestTrace, market: Market) -> &MarketPick {
    &trace.picks[market.ordinal()]
}

#[test]
fn three_contest_reference() {
    let report = run_three_contests();
    assert_eq!(3, report.total);
    assert_eq!(1, report.warming);
    assert_eq!(1, report.unplayed);
    assert!(report.rejected.is_empty());
    assert_eq!(
        vec![2, 3, 4],
        report.traces.as_ref().unwrap().iter().map(|trace| trace.contest).collect::<Vec<_>>()
    );

    let second = trace(&report, 2);
    assert_float_absolute_eq!(1.450667791942294, second.strengths.lambda.home, 1e-9);
    assert_float_absolute_eq!(1.4481894059751406, second.strengths.lambda.away, 1e-9);
    assert_eq!(Sided::new(1500.0, 1550.0), second.strengths.ratings);
    assert_float_absolute_eq!(0.38446011009948916, second.probs.home, 1e-9);
    assert_float_absolute_eq!(0.23218642099423822, second.probs.draw, 1e-9);
    assert_float_absolute_eq!(0.38335346890627275, second.probs.away, 1e-9);
    assert_float_absolute_eq!(0.5778515777215997, second.probs.btts, 1e-9);
    assert_eq!(
        vec![Score::new(1, 1), Score::new(1, 0), Score::new(0, 1)],
        second.top_scores.iter().map(|outcome| outcome.score).collect::<Vec<_>>()
    );
    assert_float_absolute_eq!(0.10791436082123412, second.top_scores[0].probability, 1e-9);

    // nothing observed yet, so calibration is the identity
    let btts = pick(second, Market::BothTeamsToScore);
    assert_eq!(Selection::Yes, btts.selection);
    assert_float_absolute_eq!(btts.raw, btts.calibrated, 1e-12);
    assert_eq!(Selection::HomeOrDraw, pick(second, Market::DoubleChance).selection);
    assert_float_absolute_eq!(0.6166465310937274, pick(second, Market::DoubleChance).probability, 1e-9);

    let third = trace(&report, 3);
    assert_float_absolute_eq!(0.4974174682264006, third.probs.home, 1e-9);
    assert_float_absolute_eq!(0.5457228755907225, third.probs.btts, 1e-9);
    assert_float_absolute_eq!(0.5479346636647625, pick(third, Market::BothTeamsToScore).calibrated, 1e-9);
    assert_eq!(Some(2.1), pick(third, Market::Over25).price);
    assert_eq!(None, pick(third, Market::Over35).price);

    let fourth = trace(&report, 4);
    assert_eq!(Selection::Under, pick(fourth, Market::Over25).selection);
    assert_float_absolute_eq!(0.4768277740119554, pick(fourth, Market::Over25).calibrated, 1e-9);
    // three goals settle the under as lost
    assert!(!pick(fourth, Market::Over25).won);
}

#[test]
fn three_contest_calibrators_and_returns() {
    let report = run_three_contests();
    let expected = [
        (Market::Over25, 0.995445158303719, -0.011194783060699945),
        (Market::Over35, 1.0148659190775662, -0.01794896351607736),
        (Market::BothTeamsToScore, 0.9997230930272368, -0.012915675550926634),
        (Market::HomeOver05, 0.9877358872334183, -0.00620769271782669),
        (Market::HomeOver15, 0.9973433532079327, -0.006012507283134365),
        (Market::AwayOver05, 0.9971579269663121, -0.0034092353030270705),
        (Market::AwayOver15, 0.9965347488678072, -0.002043935349469261),
    ];
    assert_eq!(expected.len(), report.calibrators.len());
    for (market, a, b) in expected {
        let snapshot = report.calibrators[&market];
        assert_float_absolute_eq!(a, snapshot.a, 1e-9);
        assert_float_absolute_eq!(b, snapshot.b, 1e-9);
        assert_eq!(3, snapshot.n, "{market}");
    }

    assert_eq!(
        vec![
            (Market::DoubleChance, Selection::HomeOrDraw),
            (Market::Over25, Selection::Over),
            (Market::BothTeamsToScore, Selection::Yes)
        ],
        report
            .roi
            .bets
            .iter()
            .map(|bet| (bet.key.market, bet.key.selection))
            .collect::<Vec<_>>()
    );
    assert!(report.roi.bets.iter().all(|bet| bet.key.contest == 3 && !bet.won));
    assert_eq!(97.0, report.roi.bankroll_end);
    assert_eq!(-1.0, report.roi.roi);

    let double_chance = report.market(Market::DoubleChance).unwrap();
    assert_eq!((3, 2, 1), (double_chance.picks, double_chance.wins, double_chance.bets));
    assert_float_absolute_eq!(2.0 / 3.0, report.pick_accuracy());
    assert_eq!(0.0, report.accuracy(Market::Over25));
    assert_eq!(1.0, report.accuracy(Market::Over35));

    assert_eq!(
        vec![ContestWarnings {
            contest: 3,
            warnings: vec![
                MarketMappingWarning::MissingMarket(Market::Over35),
                MarketMappingWarning::MissingMarket(Market::AwayOver05),
                MarketMappingWarning::MissingOutcomes {
                    market: Market::DoubleChance,
                    selections: vec![Selection::HomeOrAway]
                },
            ]
        }],
        report.warnings
    );

    assert_float_absolute_eq!(0.25088653611060885, report.losses.brier_1x2, 1e-9);
    assert_float_absolute_eq!(2.978407175507966, report.losses.nll_score, 1e-9);
    assert_float_absolute_eq!(0.23255531531440624, report.losses.brier_sub, 1e-9);
    assert_float_absolute_eq!(1.0 / 3.0, report.scores.exact_accuracy);
    assert_float_absolute_eq!(1.0 / 3.0, report.scores.top3_accuracy);
}

#[test]
fn traces_are_optional() {
    let dataset = Dataset::from_values(&three_contest_records());
    let ratings = RatingArchive::default();
    let config = BacktestConfig {
        collect_traces: false,
        ..three_contest_config()
    };
    let report = Backtest::new(config, &ratings, NoImpact).run(&dataset);
    assert_eq!(3, report.total);
    assert!(report.traces.is_none());
}

#[test]
fn sample_size_limits_the_replay() {
    let dataset = Dataset::from_values(&three_contest_records());
    let ratings = three_contest_ratings();
    let config = BacktestConfig {
        sample_size: Some(2),
        ..three_contest_config()
    };
    let report = Backtest::new(config, &ratings, NoImpact).run(&dataset);
    assert_eq!((1, 1, 0), (report.total, report.warming, report.unplayed));
}

#[test]
fn warm_up_contests_feed_the_tracker() {
    let dataset = Dataset::from_values(&three_contest_records());
    let ratings = RatingArchive::default();
    let backtest = Backtest::new(BacktestConfig::default(), &ratings, NoImpact);
    let contest = |id| dataset.contests.iter().find(|contest| contest.id == id).unwrap();

    let state = ReplayState::new(backtest.config()).step(&backtest, contest(1));
    let home = state.tracker().get(1).unwrap();
    assert_eq!(vec![1.8], home.scoring);
    assert_eq!(vec![1.0], home.conceded);
    assert_eq!(vec![0.9], state.tracker().get(2).unwrap().scoring);

    // unplayed contests leave no trace
    let state = state.step(&backtest, contest(5));
    assert_eq!(1, state.tracker().get(1).unwrap().observations());

    // goals stand in for missing expected goals
    let state = state.step(&backtest, contest(3));
    assert_eq!(vec![1.8, 0.0], state.tracker().get(1).unwrap().scoring);
    assert_eq!(vec![0.9, 2.0], state.tracker().get(2).unwrap().scoring);
    assert!(state.tracker().get(3).is_none());
}

#[test]
fn no_lookahead() {
    let original = run_three_contests();

    let mut records = three_contest_records();
    let priced = records.iter_mut().find(|record| record["fixture"]["id"] == 3).unwrap();
    priced["goals"] = json!({ "home": 6, "away": 5 });
    priced["stats"] = json!({ "home": { "expected_goals": 4.2 }, "away": { "expected_goals": 3.9 } });
    let ratings = three_contest_ratings();
    let altered = Backtest::new(three_contest_config(), &ratings, NoImpact).run(&Dataset::from_values(&records));

    let (before, after) = (trace(&original, 3), trace(&altered, 3));
    assert_eq!(before.strengths, after.strengths);
    assert_eq!(before.probs, after.probs);
    assert_eq!(
        before.picks.iter().map(|pick| pick.calibrated).collect::<Vec<_>>(),
        after.picks.iter().map(|pick| pick.calibrated).collect::<Vec<_>>()
    );
    assert_ne!(trace(&original, 4).probs, trace(&altered, 4).probs);
}

#[test]
fn implausible_expected_goals_leave_calibrators_bounded() {
    let mut records = three_contest_records();
    let first = records.iter_mut().find(|record| record["fixture"]["id"] == 1).unwrap();
    first["stats"] = json!({ "home": { "expected_goals": 1.7e308 }, "away": { "expected_goals": 1.7e308 } });
    let dataset = Dataset::from_values(&records);
    assert_eq!(1, dataset.rejections.len());

    let ratings = three_contest_ratings();
    let backtest = Backtest::new(three_contest_config(), &ratings, NoImpact);
    let report = backtest.run(&dataset);
    assert_eq!(1, report.rejected.len());
    assert_eq!((2, 1), (report.total, report.warming));

    // records assembled without validation still cannot drive the rates to infinity
    let mut contests = Dataset::from_values(&three_contest_records()).contests;
    let first = contests.iter_mut().find(|contest| contest.id == 1).unwrap();
    first.expected_goals = Sided::new(Some(1.7e308), Some(1.7e308));
    let report = backtest.run_contests(&contests);
    assert_eq!((0, 3), (report.total, report.warming));

    let clips = PlattConfig::default();
    for snapshot in report.calibrators.values() {
        assert!(clips.clip_a.contains(&snapshot.a), "{snapshot:?}");
        assert!(clips.clip_b.contains(&snapshot.b), "{snapshot:?}");
    }
}

#[test]
fn replays_are_idempotent() {
    let dataset = Dataset::from_values(&three_contest_records());
    let ratings = three_contest_ratings();
    let backtest = Backtest::new(three_contest_config(), &ratings, KeyPlayerImpact::default());
    let first = backtest.run(&dataset);
    let second = backtest.run(&dataset);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn confidence_bucket_keys() {
    assert_eq!(None, ConfidenceBucket::of(0.4999));
    assert_eq!(Some(ConfidenceBucket::Fifty), ConfidenceBucket::of(0.5));
    assert_eq!(Some(ConfidenceBucket::Fifty), ConfidenceBucket::of(0.5999));
    assert_eq!(Some(ConfidenceBucket::Sixty), ConfidenceBucket::of(0.6));
    assert_eq!(Some(ConfidenceBucket::Eighty), ConfidenceBucket::of(0.85));
    assert_eq!(Some(ConfidenceBucket::Ninety), ConfidenceBucket::of(0.95));
    assert_eq!(Some(ConfidenceBucket::Ninety), ConfidenceBucket::of(1.0));
    assert_eq!(None, ConfidenceBucket::of(1.01));
    assert_eq!(
        vec!["50-60", "60-70", "70-80", "80-90", "90-100"],
        ConfidenceBucket::iter().map(|bucket| bucket.label()).collect::<Vec<_>>()
    );
    assert_eq!(
        "\"70-80\"",
        serde_json::to_string(&ConfidenceBucket::Seventy).unwrap()
    );
}

#[test]
fn config_validation() {
    BacktestConfig::default().validate().unwrap();
    assert!(BacktestConfig {
        sample_size: Some(0),
        ..BacktestConfig::default()
    }
    .validate()
    .is_err());
    assert_eq!(0.02, BacktestConfig::default().calibration.lr);
}

fn run_sample_history() -> Report {
    let dataset = Dataset::read_json_file(format!("{RESOURCES}/history_sample.json")).unwrap();
    let ratings: RatingArchive = read_json(format!("{RESOURCES}/ratings_sample.json")).unwrap();
    Backtest::new(BacktestConfig::default(), &ratings, KeyPlayerImpact::default()).run(&dataset)
}

#[test]
fn regression_baseline() {
    let report = run_sample_history();
    assert_eq!(21, report.total);
    assert_eq!(9, report.warming);
    assert_eq!(1, report.unplayed);
    assert_eq!(2, report.rejected.len());

    let expected_accuracy = [
        (Market::DoubleChance, 18),
        (Market::Over25, 13),
        (Market::Over35, 16),
        (Market::BothTeamsToScore, 10),
        (Market::HomeOver05, 14),
        (Market::HomeOver15, 13),
        (Market::AwayOver05, 14),
        (Market::AwayOver15, 15),
    ];
    for (market, wins) in expected_accuracy {
        let market_report = report.market(market).unwrap();
        assert_eq!(21, market_report.picks, "{market}");
        assert_eq!(wins, market_report.wins, "{market}");
    }
    assert_float_absolute_eq!(18.0 / 21.0, report.pick_accuracy());
    assert_float_absolute_eq!(13.0 / 21.0, report.accuracy(Market::Over25));
    assert_float_absolute_eq!(10.0 / 21.0, report.accuracy(Market::BothTeamsToScore));
    assert_float_absolute_eq!(14.0 / 21.0, report.accuracy(Market::AwayOver05));

    let expected_calibrators = [
        (Market::Over25, 0.9836360635836595, -0.004059361234236216),
        (Market::Over35, 0.9592307643420116, 0.010825645073022867),
        (Market::BothTeamsToScore, 0.9850856829186673, -0.03850377837563468),
        (Market::HomeOver05, 0.9641248952438503, -0.006536407027079309),
        (Market::HomeOver15, 0.9774699194108251, -0.0024954332920102554),
        (Market::AwayOver05, 1.0350111477290433, -0.0072230466350445815),
        (Market::AwayOver15, 1.005275362660655, 0.018033180746706866),
    ];
    for (market, a, b) in expected_calibrators {
        let snapshot = report.calibrators[&market];
        assert_float_absolute_eq!(a, snapshot.a, 1e-9);
        assert_float_absolute_eq!(b, snapshot.b, 1e-9);
        assert_eq!(21, snapshot.n);
    }

    assert_eq!(16, report.warnings.len());
    assert_eq!(43, report.warnings.iter().map(|contest| contest.warnings.len()).sum::<usize>());

    assert_eq!(58, report.roi.total_bets);
    assert_float_absolute_eq!(58.0, report.roi.total_stake, 1e-9);
    assert_float_absolute_eq!(5.17, report.roi.pnl, 1e-9);
    let double_chance = report.market(Market::DoubleChance).unwrap();
    assert_eq!(16, double_chance.bets);
    assert_float_absolute_eq!(5.3, double_chance.pnl, 1e-9);
    assert_eq!(0, report.market(Market::Over35).unwrap().bets);

    assert_eq!(
        vec![(ConfidenceBucket::Sixty, 6), (ConfidenceBucket::Seventy, 14), (ConfidenceBucket::Eighty, 1)],
        report
            .buckets(Market::DoubleChance)
            .map(|bucket| (bucket.bucket, bucket.aggregate.picks))
            .collect::<Vec<_>>()
    );

    assert_float_absolute_eq!(0.18686846761638864, report.losses.brier_1x2, 1e-9);
    assert_float_absolute_eq!(2.8590199133427188, report.losses.nll_score, 1e-9);
    assert_float_absolute_eq!(0.21809646054299395, report.losses.brier_sub, 1e-9);
    assert_float_absolute_eq!(4.0 / 21.0, report.scores.exact_accuracy);
    assert_float_absolute_eq!(6.0 / 21.0, report.scores.top3_accuracy);
}

#[test]
fn absences_reach_the_estimator() {
    let dataset = Dataset::read_json_file(format!("{RESOURCES}/history_sample.json")).unwrap();
    let ratings: RatingArchive = read_json(format!("{RESOURCES}/ratings_sample.json")).unwrap();
    let config = BacktestConfig {
        collect_traces: true,
        ..BacktestConfig::default()
    };
    let report = Backtest::new(config, &ratings, KeyPlayerImpact::default()).run(&dataset);
    let trace = trace(&report, 9042);
    assert_float_absolute_eq!(1.7846089713049247, trace.strengths.lambda.home, 1e-9);
    assert_float_absolute_eq!(1.1564378661085783, trace.strengths.lambda.away, 1e-9);
    let impact = trace.strengths.impact.as_ref().unwrap();
    assert_eq!(1, impact.home.absences.len());
    assert_eq!(2, impact.away.absences.len());
    assert_ne!(trace.strengths.base, trace.strengths.lambda);
}
