//! End-to-end tests over CSV artifacts on disk.
//!
//! A mock provider feeds the retriever, the builders read the files it wrote
//! back through the same path resolver, and the batch driver writes outputs.

use chrono::{NaiveDate, NaiveDateTime};
use eventstudy_core::data::{
    MarketDataProvider, ProviderError, RawBar, RawRecommendation, Retriever,
};
use eventstudy_core::domain::EventType;
use eventstudy_core::export::{events_csv, returns_csv};
use eventstudy_core::{
    run_batch, Artifact, EventExtractor, PathResolver, PipelineError, ReturnBuilder, Stages,
    StudyConfig, TickerError,
};
use std::path::Path;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn study(dir: &Path) -> StudyConfig {
    StudyConfig {
        data_dir: dir.join("data"),
        output_dir: dir.join("out"),
        start: date("2024-01-01"),
        end: date("2024-01-31"),
        factors_csv: "ff_daily.csv".into(),
        tickers: vec!["TSLA".into()],
    }
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_factors(config: &StudyConfig) {
    write(
        &config.factors_csv(),
        "Date,mkt,smb,hml,rf\n\
         2024-01-03,0.5,0.1,0.0,0.02\n\
         2024-01-04,-0.25,0.0,0.1,0.02\n\
         2024-01-05,0.125,0.0,0.0,0.02\n",
    );
}

struct MockProvider {
    fail_recommendations: bool,
}

impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_prices(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<RawBar>, ProviderError> {
        if ticker == "MISSING" {
            return Err(ProviderError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        Ok([("2024-01-02", 100.0), ("2024-01-03", 110.0), ("2024-01-04", 99.0)]
            .iter()
            .map(|(d, c)| RawBar {
                date: date(d),
                open: *c,
                high: *c,
                low: *c,
                close: *c,
                adj_close: *c,
                volume: 1_000,
            })
            .collect())
    }

    fn fetch_recommendations(
        &self,
        _ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<RawRecommendation>, ProviderError> {
        if self.fail_recommendations {
            return Err(ProviderError::AuthenticationRequired("crumb".into()));
        }
        let rec = |t: &str, firm: &str, action: &str| RawRecommendation {
            timestamp: ts(t),
            firm: firm.to_string(),
            to_grade: "Buy".to_string(),
            from_grade: String::new(),
            action: action.to_string(),
        };
        Ok(vec![
            rec("2024-01-03 09:00:00", "ABC", "initiate"),
            rec("2024-01-03 10:00:00", "abc", "down"),
            rec("2024-01-03 14:00:00", "AbC", "up"),
            rec("2024-01-04 11:00:00", "Wedbush", "down"),
            rec("2024-01-05 08:00:00", "UBS", "main"),
        ])
    }
}

#[test]
fn retrieved_artifacts_feed_both_builders() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write_factors(&config);

    let provider = MockProvider {
        fail_recommendations: false,
    };
    let report = Retriever::new(&provider, &config, config.start, config.end)
        .retrieve("TSLA")
        .unwrap();
    assert_eq!(report.bar_count, 3);
    assert_eq!(report.recommendation_count, Some(5));

    let prc = std::fs::read_to_string(config.artifacts("TSLA").prc_csv).unwrap();
    assert!(prc.starts_with("Date,Open,High,Low,Close,Adj Close,Volume\n"));

    let returns = ReturnBuilder::new(&config).build_returns("TSLA").unwrap();
    assert_eq!(returns.dates(), vec![date("2024-01-03"), date("2024-01-04")]);
    assert!((returns.rows()[0].ret - 0.10).abs() < 1e-12);
    assert!((returns.rows()[1].ret + 0.10).abs() < 1e-12);
    assert_eq!(returns.rows()[1].mkt, -0.25);

    let events = EventExtractor::new(&config).build_events("TSLA").unwrap();
    let rows: Vec<(usize, &str, &str, EventType)> = events
        .rows()
        .iter()
        .map(|e| (e.event_id, e.event_date.as_str(), e.firm.as_str(), e.event_type))
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, "2024-01-03", "ABC", EventType::Upgrade),
            (2, "2024-01-04", "WEDBUSH", EventType::Downgrade),
        ]
    );
}

#[test]
fn builders_are_byte_identical_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write_factors(&config);
    let provider = MockProvider {
        fail_recommendations: false,
    };
    Retriever::new(&provider, &config, config.start, config.end)
        .retrieve("TSLA")
        .unwrap();

    let builder = ReturnBuilder::new(&config);
    let a = returns_csv(&builder.build_returns("TSLA").unwrap()).unwrap();
    let b = returns_csv(&builder.build_returns("TSLA").unwrap()).unwrap();
    assert_eq!(a, b);

    let extractor = EventExtractor::new(&config);
    let a = events_csv(&extractor.build_events("TSLA").unwrap()).unwrap();
    let b = events_csv(&extractor.build_events("TSLA").unwrap()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_factor_file_is_missing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write(
        &config.artifacts("TSLA").prc_csv,
        "Date,Close\n2024-01-02,100\n2024-01-03,101\n",
    );

    match ReturnBuilder::new(&config).build_returns("TSLA") {
        Err(PipelineError::MissingArtifact { artifact, path, .. }) => {
            assert_eq!(artifact, Artifact::Factors);
            assert_eq!(path, config.factors_csv());
        }
        other => panic!("expected MissingArtifact, got {other:?}"),
    }
}

#[test]
fn price_file_without_close_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write_factors(&config);
    write(
        &config.artifacts("TSLA").prc_csv,
        "Date,Open\n2024-01-02,100\n",
    );

    assert!(matches!(
        ReturnBuilder::new(&config).build_returns("TSLA"),
        Err(PipelineError::MalformedInput { artifact: Artifact::Prices, .. })
    ));
}

#[test]
fn recommendation_file_with_offsets_and_raw_headers() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write(
        &config.artifacts("TSLA").rec_csv,
        "Date,Firm,To Grade,From Grade,Action\n\
         2024-01-03 14:00:00-05:00,Citigroup,Sell,Neutral,down\n\
         2024-01-03 09:00:00-05:00,Citigroup,Buy,Neutral,up\n\
         2024-01-04 09:00:00-05:00,Baird,Outperform,,init\n",
    );

    let events = EventExtractor::new(&config).build_events("TSLA").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events.rows()[0].firm, "CITIGROUP");
    assert_eq!(events.rows()[0].event_type, EventType::Downgrade);
}

#[test]
fn batch_writes_outputs_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write_factors(&config);
    let provider = MockProvider {
        fail_recommendations: false,
    };

    let stages = Stages {
        retrieve: true,
        returns: true,
        events: true,
    };
    let tickers = vec!["TSLA".to_string(), "MISSING".to_string()];
    let provider: &dyn MarketDataProvider = &provider;
    let summary = run_batch(&config, Some(provider), &tickers, stages, false);

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded.len(), 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].0, "MISSING");
    assert!(matches!(summary.errors[0].1, TickerError::Retrieve(_)));

    let ret = std::fs::read_to_string(config.returns_output("TSLA")).unwrap();
    assert_eq!(ret.lines().next(), Some("date,ret,mkt"));
    assert_eq!(ret.lines().count(), 3);

    let events = std::fs::read_to_string(config.events_output("TSLA")).unwrap();
    assert_eq!(
        events,
        "event_id,event_date,firm,event_type\n1,2024-01-03,ABC,upgrade\n2,2024-01-04,WEDBUSH,downgrade\n"
    );

    let run = &summary.succeeded[0];
    assert_eq!(run.events.as_ref().unwrap().upgrades, 1);
    assert!(config.summary_output("TSLA").exists());
}

#[test]
fn retrieval_can_tolerate_missing_recommendations() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    let provider = MockProvider {
        fail_recommendations: true,
    };

    let strict = Retriever::new(&provider, &config, config.start, config.end).retrieve("TSLA");
    assert!(matches!(strict, Err(ProviderError::AuthenticationRequired(_))));

    let report = Retriever::new(&provider, &config, config.start, config.end)
        .allow_missing_recommendations(true)
        .retrieve("TSLA")
        .unwrap();
    assert_eq!(report.recommendation_count, None);
    assert!(report.prc_csv.exists());
    assert!(!report.rec_csv.exists());

    // Without the recommendation artifact the extractor reports it missing.
    assert!(matches!(
        EventExtractor::new(&config).build_events("TSLA"),
        Err(PipelineError::MissingArtifact { artifact: Artifact::Recommendations, .. })
    ));
}

#[test]
fn batch_without_recommendations_skips_events() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write_factors(&config);
    let provider = MockProvider {
        fail_recommendations: true,
    };
    let provider: &dyn MarketDataProvider = &provider;
    let stages = Stages {
        retrieve: true,
        returns: true,
        events: true,
    };

    let summary = run_batch(&config, Some(provider), &["TSLA".to_string()], stages, true);

    assert!(summary.all_succeeded(), "{:?}", summary.errors);
    let run = &summary.succeeded[0];
    assert_eq!(run.returns.as_ref().unwrap().rows, 2);
    assert!(run.events.is_none());
    assert!(config.returns_output("TSLA").exists());
    assert!(!config.events_output("TSLA").exists());
    assert!(config.summary_output("TSLA").exists());
}

#[test]
fn skipped_recommendations_never_reuse_older_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write_factors(&config);
    let rec_csv = config.artifacts("TSLA").rec_csv;
    write(
        &rec_csv,
        "Date,Firm,To Grade,From Grade,Action\n2019-05-01 09:00:00,Old,Buy,,up\n",
    );
    write(
        &config.events_output("TSLA"),
        "event_id,event_date,firm,event_type\n1,2019-05-01,OLD,upgrade\n",
    );
    let provider = MockProvider {
        fail_recommendations: true,
    };
    let provider: &dyn MarketDataProvider = &provider;
    let stages = Stages {
        retrieve: true,
        returns: true,
        events: true,
    };

    let summary = run_batch(&config, Some(provider), &["TSLA".to_string()], stages, true);

    assert!(summary.all_succeeded(), "{:?}", summary.errors);
    assert!(summary.succeeded[0].events.is_none());
    assert!(!rec_csv.exists());
    assert!(!config.events_output("TSLA").exists());
}

#[test]
fn failing_ticker_writes_no_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = study(dir.path());
    write_factors(&config);
    write(
        &config.artifacts("TSLA").prc_csv,
        "Date,Close\n2024-01-02,100\n2024-01-03,101\n",
    );
    write(
        &config.artifacts("TSLA").rec_csv,
        "Date,Firm,Action\nnot a date,Citigroup,up\n",
    );

    let summary = run_batch(&config, None, &["TSLA".to_string()], Stages::default(), false);

    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        summary.errors[0].1,
        TickerError::Pipeline(PipelineError::MalformedInput {
            artifact: Artifact::Recommendations,
            ..
        })
    ));
    assert!(!config.returns_output("TSLA").exists());
    assert!(!config.events_output("TSLA").exists());
    assert!(!config.summary_output("TSLA").exists());
}
