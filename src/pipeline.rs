//! Store-backed orchestration: ingest snapshots, extract weeks, maintain the
//! persisted tables, export them.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::analyzer::WeekExtractor;
use crate::db::Database;
use crate::db::models::RawWeek;
use crate::series::table::WideTable;
use crate::series::{
    ARTIST_POPULARITY, EMOTION_FREQUENCY, SUMMARY, SeriesBuilder, SummaryTable, TimeSeries,
    WORD_FREQUENCY,
};

#[derive(Debug)]
pub struct IngestResult {
    pub stored: Vec<NaiveDate>,
    pub failed: usize,
}

#[derive(Debug)]
pub struct ExtractResult {
    pub date: NaiveDate,
    pub n_songs: usize,
    pub n_songs_lyrics_analyzed: usize,
    pub total_weeks: usize,
}

#[derive(Debug)]
pub struct RebuildResult {
    pub weeks: usize,
    pub skipped: usize,
    pub artists: usize,
    pub words: usize,
}

/// Validate and store snapshot files. Unreadable or malformed files are
/// logged and counted; a date already in the store is overwritten.
pub fn ingest_files(db: &Database, paths: &[PathBuf]) -> Result<IngestResult> {
    let mut stored = Vec::new();
    let mut failed = 0;

    for path in paths {
        match read_snapshot(path) {
            Ok((week, body)) => {
                db.put_snapshot(&week.date.to_string(), &body)?;
                log::info!(
                    "Stored week {} ({} songs) from {}",
                    week.date,
                    week.data.len(),
                    path.display()
                );
                stored.push(week.date);
            }
            Err(e) => {
                log::warn!("Skipping {}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    Ok(IngestResult { stored, failed })
}

fn read_snapshot(path: &Path) -> Result<(RawWeek, String)> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let week: RawWeek = serde_json::from_str(&body).context("parsing snapshot")?;
    Ok((week, body))
}

/// Extract one stored week (default: the latest) and append it to the
/// persisted tables.
pub fn extract_week(
    db: &Database,
    extractor: &WeekExtractor,
    confidence_frac: f64,
    date: Option<NaiveDate>,
) -> Result<ExtractResult> {
    let key = match date {
        Some(d) => d.to_string(),
        None => match db.latest_snapshot_date()? {
            Some(latest) => latest,
            None => bail!("No snapshots stored; run `ingest` first"),
        },
    };

    let week = db
        .get_snapshot(&key)?
        .with_context(|| format!("No snapshot stored for {key}"))?;
    let record = extractor.extract_week(&week);

    let fresh = SeriesBuilder::build(vec![record.clone()], confidence_frac)?;
    let mut series = load_series(db)?;
    series
        .append(&fresh)
        .with_context(|| format!("appending week {}", week.date))?;
    save_series(db, &series)?;

    log::info!(
        "Week {}: {}/{} songs analyzed",
        week.date,
        record.n_songs_lyrics_analyzed,
        record.n_songs()
    );

    Ok(ExtractResult {
        date: week.date,
        n_songs: record.n_songs(),
        n_songs_lyrics_analyzed: record.n_songs_lyrics_analyzed,
        total_weeks: series.summary.len(),
    })
}

/// Re-extract every stored week and replace the persisted tables.
pub fn rebuild(
    db: &Database,
    extractor: &WeekExtractor,
    confidence_frac: f64,
    jobs: usize,
) -> Result<RebuildResult> {
    let dates = db.snapshot_dates()?;
    let mut weeks = Vec::with_capacity(dates.len());
    let mut skipped = 0;

    for date in &dates {
        match db.get_snapshot(date) {
            Ok(Some(week)) => weeks.push(week),
            Ok(None) => skipped += 1,
            Err(e) => {
                log::warn!("Skipping snapshot {date}: {e}");
                skipped += 1;
            }
        }
    }

    let records = extractor.extract_weeks(&weeks, jobs)?;
    let series = SeriesBuilder::build(records, confidence_frac)?;
    save_series(db, &series)?;

    log::info!("Rebuilt tables from {} weeks ({} skipped)", weeks.len(), skipped);

    Ok(RebuildResult {
        weeks: weeks.len(),
        skipped,
        artists: series.artist_popularity.columns().len(),
        words: series.word_frequency.columns().len(),
    })
}

/// Persisted tables, empty when nothing has been extracted yet.
pub fn load_series(db: &Database) -> Result<TimeSeries> {
    let wide = |name: &str| -> Result<WideTable> {
        Ok(db.get_series::<WideTable>(name)?.unwrap_or_default())
    };
    Ok(TimeSeries {
        artist_popularity: wide(ARTIST_POPULARITY)?,
        word_frequency: wide(WORD_FREQUENCY)?,
        emotion_frequency: wide(EMOTION_FREQUENCY)?,
        summary: db.get_series::<SummaryTable>(SUMMARY)?.unwrap_or_default(),
    })
}

pub fn save_series(db: &Database, series: &TimeSeries) -> Result<()> {
    db.put_series(ARTIST_POPULARITY, &series.artist_popularity)?;
    db.put_series(WORD_FREQUENCY, &series.word_frequency)?;
    db.put_series(EMOTION_FREQUENCY, &series.emotion_frequency)?;
    db.put_series(SUMMARY, &series.summary)?;
    Ok(())
}

/// Write `<table>.json` row-oriented records into `dir`.
pub fn export(db: &Database, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let series = load_series(db)?;

    let outputs = [
        (ARTIST_POPULARITY, serde_json::to_value(series.artist_popularity.to_records())?),
        (WORD_FREQUENCY, serde_json::to_value(series.word_frequency.to_records())?),
        (EMOTION_FREQUENCY, serde_json::to_value(series.emotion_frequency.to_records())?),
        (SUMMARY, serde_json::to_value(series.summary.to_records())?),
    ];

    let mut written = Vec::with_capacity(outputs.len());
    for (name, value) in outputs {
        let path = dir.join(format!("{name}.json"));
        let body = serde_json::to_string_pretty(&value)?;
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("Exported {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::affect::LexiconAffectScorer;
    use crate::analyzer::aggregate::WeekAggregator;
    use crate::analyzer::text::{LanguageClassifier, TextNormalizer};
    use crate::series::SeriesError;

    struct AlwaysEnglish;

    impl LanguageClassifier for AlwaysEnglish {
        fn detect(&self, _text: &str) -> Option<&'static str> {
            Some("eng")
        }
    }

    fn extractor() -> WeekExtractor {
        WeekExtractor::new(
            TextNormalizer::new(Box::new(AlwaysEnglish), "eng"),
            Box::new(LexiconAffectScorer::builtin()),
            WeekAggregator::default(),
        )
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn snapshot(d: u32, artist: &str) -> String {
        format!(
            r#"{{"date": "2023-01-{d:02}", "data": [
                {{"song": "One", "artist": "{artist}", "this_week": 1, "peak_position": 1,
                  "weeks_on_chart": 2, "duration": "180000",
                  "lyrics": "[Verse]\nI love the rain\nlove it so", "tags": ["pop"]}},
                {{"song": "Two", "artist": "Solo", "this_week": 2, "duration": 0}}
            ]}}"#
        )
    }

    fn write_files(dir: &Path, weeks: &[(u32, &str)]) -> Vec<PathBuf> {
        weeks
            .iter()
            .map(|(d, artist)| {
                let path = dir.join(format!("week-{d}.json"));
                std::fs::write(&path, snapshot(*d, artist)).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_ingest_skips_malformed_files() {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_files(dir.path(), &[(7, "A"), (14, "B")]);
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        paths.push(bad);
        paths.push(dir.path().join("missing.json"));

        let result = ingest_files(&db, &paths).unwrap();
        assert_eq!(result.stored, vec![day(7), day(14)]);
        assert_eq!(result.failed, 2);
        assert_eq!(db.snapshot_dates().unwrap(), vec!["2023-01-07", "2023-01-14"]);
    }

    #[test]
    fn test_incremental_extract_matches_rebuild() {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        ingest_files(&db, &write_files(dir.path(), &[(7, "A & B"), (14, "C featuring A")])).unwrap();
        let ex = extractor();

        let first = extract_week(&db, &ex, 0.84, Some(day(7))).unwrap();
        assert_eq!(first.n_songs, 2);
        assert_eq!(first.n_songs_lyrics_analyzed, 1);
        let second = extract_week(&db, &ex, 0.84, None).unwrap();
        assert_eq!(second.date, day(14));
        assert_eq!(second.total_weeks, 2);
        let incremental = load_series(&db).unwrap();

        let result = rebuild(&db, &ex, 0.84, 2).unwrap();
        assert_eq!(result.weeks, 2);
        assert_eq!(result.skipped, 0);
        assert_eq!(load_series(&db).unwrap(), incremental);

        let artists = &incremental.artist_popularity;
        assert_eq!(artists.value(day(7), "A"), Some(100.0));
        assert_eq!(artists.value(day(7), "C"), Some(0.0));
        assert_eq!(artists.value(day(14), "C"), Some(100.0));
        assert!(incremental.word_frequency.value(day(7), "love").unwrap() > 0.0);
    }

    #[test]
    fn test_extract_rejects_stale_week() {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        ingest_files(&db, &write_files(dir.path(), &[(7, "A"), (14, "B")])).unwrap();
        let ex = extractor();

        extract_week(&db, &ex, 0.84, Some(day(14))).unwrap();
        let before = load_series(&db).unwrap();

        let err = extract_week(&db, &ex, 0.84, Some(day(7))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeriesError>(),
            Some(SeriesError::OrderingViolation { .. })
        ));
        assert_eq!(load_series(&db).unwrap(), before);
    }

    #[test]
    fn test_extract_without_snapshots_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(extract_week(&db, &extractor(), 0.84, None).is_err());
        assert!(extract_week(&db, &extractor(), 0.84, Some(day(7))).is_err());
    }

    #[test]
    fn test_rebuild_skips_unparseable_snapshot() {
        let db = Database::open_in_memory().unwrap();
        db.put_snapshot("2023-01-07", &snapshot(7, "A")).unwrap();
        db.put_snapshot("2023-01-14", "{\"date\": \"2023-01-14\"}").unwrap();

        let result = rebuild(&db, &extractor(), 0.84, 1).unwrap();
        assert_eq!(result.weeks, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(load_series(&db).unwrap().summary.len(), 1);
    }

    #[test]
    fn test_export_writes_row_records() {
        let db = Database::open_in_memory().unwrap();
        db.put_snapshot("2023-01-07", &snapshot(7, "A")).unwrap();
        rebuild(&db, &extractor(), 0.84, 1).unwrap();

        let out = tempfile::tempdir().unwrap();
        let written = export(&db, out.path()).unwrap();
        assert_eq!(written.len(), 4);

        let body = std::fs::read_to_string(out.path().join("artist_popularity.json")).unwrap();
        let records: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(records[0]["date"], "2023-01-07");
        assert_eq!(records[0]["A"], 100.0);
        assert_eq!(records[0]["Solo"], 99.0);

        let body = std::fs::read_to_string(out.path().join("summary.json")).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(summary[0]["n_songs"], 2);
        assert_eq!(summary[0]["date"], "2023-01-07");
        assert!((summary[0]["median_duration"].as_f64().unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(summary[0]["err_duration_low"], 0.0);
        assert!(summary[0]["median_wpm"].is_number());
        assert!(summary[0].get("duration").is_none());
    }
}
