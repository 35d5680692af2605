use stanza::style::HAlign::Left;
use stanza::style::{HAlign, Header, MinWidth, Styles};
use stanza::table::{Col, Row, Table};

use crate::backtest::{MarketReport, Report};

fn market_cols(lead: &str) -> (Vec<Col>, Row) {
    let cols = vec![
        Col::new(Styles::default().with(MinWidth(12)).with(Left)),
        Col::new(Styles::default().with(MinWidth(6)).with(HAlign::Right)),
        Col::new(Styles::default().with(MinWidth(6)).with(HAlign::Right)),
        Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
        Col::new(Styles::default().with(MinWidth(5)).with(HAlign::Right)),
        Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
        Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
        Col::new(Styles::default().with(MinWidth(7)).with(HAlign::Right)),
    ];
    let header = Row::new(
        Styles::default().with(Header(true)),
        vec![
            lead.into(),
            "Picks".into(),
            "Wins".into(),
            "Accuracy".into(),
            "Bets".into(),
            "Stake".into(),
            "P&L".into(),
            "ROI".into(),
        ],
    );
    (cols, header)
}

fn market_row(label: String, report: &MarketReport) -> Row {
    Row::new(
        Styles::default(),
        vec![
            label.into(),
            format!("{}", report.picks).into(),
            format!("{}", report.wins).into(),
            format!("{:.1}%", report.accuracy * 100.0).into(),
            format!("{}", report.bets).into(),
            format!("{:.2}", report.stake).into(),
            format!("{:+.2}", report.pnl).into(),
            format!("{:+.1}%", report.roi * 100.0).into(),
        ],
    )
}

pub fn tabulate_markets(report: &Report) -> Table {
    let (cols, header) = market_cols("Market");
    let mut table = Table::default().with_cols(cols).with_row(header);
    for market in &report.markets {
        table.push_row(market_row(market.market.label().to_string(), market));
    }
    table
}

pub fn tabulate_buckets(report: &Report) -> Table {
    let (cols, header) = market_cols("Confidence");
    let mut table = Table::default().with_cols(cols).with_row(header);
    for bucket in &report.buckets {
        table.push_row(market_row(
            format!("{} {}", bucket.aggregate.market.label(), bucket.bucket.label()),
            &bucket.aggregate,
        ));
    }
    table
}

pub fn tabulate_calibrators(report: &Report) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(12)).with(Left)),
            Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(5)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec!["Market".into(), "a".into(), "b".into(), "n".into()],
        ));
    for (market, snapshot) in &report.calibrators {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                market.label().into(),
                format!("{:.4}", snapshot.a).into(),
                format!("{:+.4}", snapshot.b).into(),
                format!("{}", snapshot.n).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_summary(report: &Report) -> Table {
    let mut table = Table::default().with_cols(vec![
        Col::new(Styles::default().with(MinWidth(16)).with(Left)),
        Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
    ]);
    let rows = [
        ("Evaluated", format!("{}", report.total)),
        ("Warming up", format!("{}", report.warming)),
        ("Unplayed", format!("{}", report.unplayed)),
        ("Rejected", format!("{}", report.rejected.len())),
        ("Brier 1X2", format!("{:.4}", report.losses.brier_1x2)),
        ("Score NLL", format!("{:.4}", report.losses.nll_score)),
        ("Brier binary", format!("{:.4}", report.losses.brier_sub)),
        ("Exact score", format!("{:.1}%", report.scores.exact_accuracy * 100.0)),
        ("Top-3 score", format!("{:.1}%", report.scores.top3_accuracy * 100.0)),
        ("Bets", format!("{}", report.roi.total_bets)),
        ("Turnover", format!("{:.2}", report.roi.total_stake)),
        ("P&L", format!("{:+.2}", report.roi.pnl)),
        ("ROI", format!("{:+.1}%", report.roi.roi * 100.0)),
        ("Bankroll", format!("{:.2}", report.roi.bankroll_end)),
    ];
    for (label, value) in rows {
        table.push_row(Row::new(Styles::default(), vec![label.into(), value.into()]));
    }
    table
}
