//! Week-indexed output tables and the chronological merge that fills them.

pub mod credits;
pub mod stats;
pub mod table;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::affect::Emotion;
use crate::analyzer::tally::Tally;
use crate::db::models::AggregateWeekRecord;
use stats::{Band, StatsError};
use table::WideTable;

pub const ARTIST_POPULARITY: &str = "artist_popularity";
pub const WORD_FREQUENCY: &str = "word_frequency";
pub const EMOTION_FREQUENCY: &str = "emotion_frequency";
pub const SUMMARY: &str = "summary";

pub const TABLE_NAMES: [&str; 4] = [ARTIST_POPULARITY, WORD_FREQUENCY, EMOTION_FREQUENCY, SUMMARY];

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Error, Debug, PartialEq)]
pub enum SeriesError {
    #[error("Week {date} is not after the latest merged week {latest}")]
    OrderingViolation { date: NaiveDate, latest: NaiveDate },
    #[error("Malformed table: {0}")]
    Malformed(String),
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),
}

/// Summary statistics for one week. Bands are `None` when no song had a valid value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatsRow {
    pub date: NaiveDate,
    pub n_songs: usize,
    pub n_songs_lyrics_analyzed: usize,
    pub top_tags: Vec<(String, u32)>,
    /// Minutes.
    pub duration: Option<Band>,
    pub wpm: Option<Band>,
    pub weeks_on_chart: Option<Band>,
}

impl SummaryStatsRow {
    /// Flat record: counts, `top_tags` as a comma-joined string, and
    /// `median_*`/`err_*_low`/`err_*_high` per field (null without a band).
    pub fn to_record(&self) -> serde_json::Value {
        let mut record = serde_json::Map::new();
        record.insert("date".to_string(), self.date.to_string().into());
        record.insert("n_songs".to_string(), self.n_songs.into());
        record.insert(
            "n_songs_lyrics_analyzed".to_string(),
            self.n_songs_lyrics_analyzed.into(),
        );
        let tags: Vec<&str> = self.top_tags.iter().map(|(t, _)| t.as_str()).collect();
        record.insert("top_tags".to_string(), tags.join(", ").into());

        for (field, band) in [
            ("duration", self.duration),
            ("wpm", self.wpm),
            ("weeks", self.weeks_on_chart),
        ] {
            let (median, low, high): (serde_json::Value, serde_json::Value, serde_json::Value) =
                match band {
                    Some(b) => (b.median.into(), b.err_low.into(), b.err_high.into()),
                    None => (
                        serde_json::Value::Null,
                        serde_json::Value::Null,
                        serde_json::Value::Null,
                    ),
                };
            record.insert(format!("median_{field}"), median);
            record.insert(format!("err_{field}_low"), low);
            record.insert(format!("err_{field}_high"), high);
        }
        serde_json::Value::Object(record)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryTable {
    rows: Vec<SummaryStatsRow>,
}

impl SummaryTable {
    pub fn rows(&self) -> &[SummaryStatsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn check_append(&self, date: NaiveDate) -> Result<(), SeriesError> {
        match self.latest_date() {
            Some(latest) if date <= latest => Err(SeriesError::OrderingViolation { date, latest }),
            _ => Ok(()),
        }
    }

    pub fn push(&mut self, row: SummaryStatsRow) -> Result<(), SeriesError> {
        self.check_append(row.date)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn append(&mut self, other: &SummaryTable) -> Result<(), SeriesError> {
        for row in &other.rows {
            self.push(row.clone())?;
        }
        Ok(())
    }

    pub fn to_records(&self) -> Vec<serde_json::Value> {
        self.rows.iter().map(SummaryStatsRow::to_record).collect()
    }

    /// The last `n` rows, oldest first.
    pub fn latest(&self, n: usize) -> &[SummaryStatsRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

/// The four output tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub artist_popularity: WideTable,
    pub word_frequency: WideTable,
    pub emotion_frequency: WideTable,
    pub summary: SummaryTable,
}

impl TimeSeries {
    pub fn latest_date(&self) -> Option<NaiveDate> {
        [
            self.artist_popularity.latest_date(),
            self.word_frequency.latest_date(),
            self.emotion_frequency.latest_date(),
            self.summary.latest_date(),
        ]
        .into_iter()
        .flatten()
        .max()
    }

    fn check_append(&self, date: NaiveDate) -> Result<(), SeriesError> {
        self.artist_popularity.check_append(date)?;
        self.word_frequency.check_append(date)?;
        self.emotion_frequency.check_append(date)?;
        self.summary.check_append(date)
    }

    /// Append a later batch. Nothing is written unless every table accepts it.
    pub fn append(&mut self, other: &TimeSeries) -> Result<(), SeriesError> {
        let first = [
            other.artist_popularity.first_date(),
            other.word_frequency.first_date(),
            other.emotion_frequency.first_date(),
            other.summary.rows().first().map(|r| r.date),
        ]
        .into_iter()
        .flatten()
        .min();
        if let Some(first) = first {
            self.check_append(first)?;
        }

        self.artist_popularity.append(&other.artist_popularity)?;
        self.word_frequency.append(&other.word_frequency)?;
        self.emotion_frequency.append(&other.emotion_frequency)?;
        self.summary.append(&other.summary)
    }
}

/// Merges `AggregateWeekRecord`s into a `TimeSeries` in date order.
#[derive(Debug, Clone)]
pub struct SeriesBuilder {
    confidence_frac: f64,
    series: TimeSeries,
}

impl SeriesBuilder {
    pub fn new(confidence_frac: f64) -> Result<Self, SeriesError> {
        Self::resume(TimeSeries::default(), confidence_frac)
    }

    /// Continue merging onto previously persisted tables.
    pub fn resume(series: TimeSeries, confidence_frac: f64) -> Result<Self, SeriesError> {
        stats::check_fraction(confidence_frac)?;
        Ok(Self {
            confidence_frac,
            series,
        })
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn into_series(self) -> TimeSeries {
        self.series
    }

    /// Append one week to all four tables, or to none of them.
    pub fn merge_week(&mut self, record: &AggregateWeekRecord) -> Result<(), SeriesError> {
        let date = record.date;
        self.series.check_append(date)?;

        let mut artists = Tally::new();
        for song in &record.songs {
            credits::allocate(&song.artist, song.this_week, &mut artists);
        }

        let words = record
            .word_fd_avg
            .iter()
            .flatten()
            .filter(|(word, _)| !word.is_empty())
            .map(|(word, freq)| (word.as_str(), *freq));

        let affect = record.affect_fq_avg.unwrap_or_default();
        let emotions = Emotion::ALL.iter().map(|&e| (e.name(), affect.get(e)));

        let summary = summarize_week(record, self.confidence_frac);

        self.series.artist_popularity.push_row(date, artists.iter())?;
        self.series.word_frequency.push_row(date, words)?;
        self.series.emotion_frequency.push_row(date, emotions)?;
        self.series.summary.push(summary)?;

        log::debug!(
            "Merged week {date}: {} artists, {} word columns",
            artists.len(),
            self.series.word_frequency.columns().len()
        );
        Ok(())
    }

    /// Build fresh tables from unordered records.
    pub fn build(
        mut records: Vec<AggregateWeekRecord>,
        confidence_frac: f64,
    ) -> Result<TimeSeries, SeriesError> {
        records.sort_by_key(|r| r.date);
        let mut builder = Self::new(confidence_frac)?;
        for record in &records {
            builder.merge_week(record)?;
        }
        Ok(builder.into_series())
    }
}

fn optional_band(values: &[Option<f64>], frac: f64, field: &str, date: NaiveDate) -> Option<Band> {
    match stats::band(values, frac) {
        Ok(b) => Some(b),
        Err(e) => {
            log::debug!("Week {date}: no {field} band ({e})");
            None
        }
    }
}

/// Song counts, top tags and robust bands for duration, words per minute
/// and weeks on chart.
pub fn summarize_week(record: &AggregateWeekRecord, frac: f64) -> SummaryStatsRow {
    let date = record.date;
    let nonzero = |v: Option<f64>| v.filter(|x| *x != 0.0);

    let durations: Vec<Option<f64>> = record.durations().into_iter().map(nonzero).collect();

    let wpm: Vec<Option<f64>> = record
        .word_counts()
        .into_iter()
        .zip(&durations)
        .map(|(words, duration)| match (nonzero(words), duration) {
            (Some(w), Some(d)) => Some(w / d),
            _ => None,
        })
        .collect();

    let weeks: Vec<Option<f64>> = record.weeks_on_chart().into_iter().map(nonzero).collect();

    SummaryStatsRow {
        date,
        n_songs: record.n_songs(),
        n_songs_lyrics_analyzed: record.n_songs_lyrics_analyzed,
        top_tags: record.tag_fd.clone(),
        duration: optional_band(&durations, frac, "duration", date)
            .map(|b| b.scaled(1.0 / MS_PER_MINUTE)),
        wpm: optional_band(&wpm, frac, "words-per-minute", date).map(|b| b.scaled(MS_PER_MINUTE)),
        weeks_on_chart: optional_band(&weeks, frac, "weeks-on-chart", date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::affect::AffectVector;
    use crate::db::models::SongRecord;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn song(artist: &str, rank: u32, duration: Option<f64>, n_words: Option<usize>) -> SongRecord {
        SongRecord {
            song: format!("{artist} song"),
            artist: artist.to_string(),
            this_week: rank,
            peak_position: rank,
            weeks_on_chart: rank,
            duration,
            n_words,
        }
    }

    fn record(d: u32, songs: Vec<SongRecord>, words: Option<Vec<(&str, f64)>>) -> AggregateWeekRecord {
        let analyzed = songs.iter().filter(|s| s.n_words.is_some()).count();
        AggregateWeekRecord {
            date: day(d),
            n_songs_lyrics_analyzed: analyzed,
            tag_fd: vec![("pop".to_string(), 2)],
            affect_fq_avg: words.as_ref().map(|_| AffectVector::default()),
            word_fd_avg: words.map(|w| w.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
            songs,
        }
    }

    #[test]
    fn test_collaboration_splits_full_weight() {
        let series = SeriesBuilder::build(vec![record(7, vec![song("A & B", 1, None, None)], None)], 0.84)
            .unwrap();
        let t = &series.artist_popularity;
        assert_eq!(t.columns(), ["A", "B"]);
        assert_eq!(t.value(day(7), "A"), Some(100.0));
        assert_eq!(t.value(day(7), "B"), Some(100.0));
    }

    #[test]
    fn test_new_artist_in_second_week() {
        let w1 = record(7, vec![song("A", 1, None, None)], None);
        let w2 = record(14, vec![song("A", 2, None, None), song("C", 1, None, None)], None);
        let series = SeriesBuilder::build(vec![w2, w1], 0.84).unwrap();

        let t = &series.artist_popularity;
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[0].date, day(7));
        assert_eq!(t.rows()[1].date, day(14));
        assert_eq!(t.value(day(7), "C"), Some(0.0));
        assert_eq!(t.value(day(14), "C"), Some(100.0));
        assert_eq!(t.value(day(14), "A"), Some(99.0));
    }

    #[test]
    fn test_incremental_equals_batch() {
        let weeks = vec![
            record(7, vec![song("A", 1, Some(180_000.0), Some(300))], Some(vec![("love", 0.1)])),
            record(14, vec![song("B featuring C", 3, None, None)], None),
            record(21, vec![song("A", 2, Some(240_000.0), Some(200))], Some(vec![("rain", 0.2)])),
        ];

        let batch = SeriesBuilder::build(weeks.clone(), 0.84).unwrap();

        let mut builder = SeriesBuilder::new(0.84).unwrap();
        for week in &weeks {
            builder.merge_week(week).unwrap();
        }
        assert_eq!(builder.into_series(), batch);

        // persisted prefix + fresh suffix gives the same tables too
        let mut head = SeriesBuilder::build(weeks[..1].to_vec(), 0.84).unwrap();
        let tail = SeriesBuilder::build(weeks[1..].to_vec(), 0.84).unwrap();
        head.append(&tail).unwrap();
        assert_eq!(head, batch);
    }

    #[test]
    fn test_out_of_order_week_leaves_tables_unchanged() {
        let mut builder = SeriesBuilder::new(0.84).unwrap();
        builder.merge_week(&record(21, vec![song("A", 1, None, None)], None)).unwrap();
        let before = builder.series().clone();

        let err = builder
            .merge_week(&record(7, vec![song("Z", 1, None, None)], Some(vec![("x", 1.0)])))
            .unwrap_err();
        assert_eq!(err, SeriesError::OrderingViolation { date: day(7), latest: day(21) });
        assert_eq!(builder.series(), &before);
        assert!(builder.merge_week(&record(21, vec![], None)).is_err());
    }

    #[test]
    fn test_unanalyzed_week_gives_zero_rows() {
        let w1 = record(7, vec![song("A", 1, None, Some(10))], Some(vec![("love", 0.3), ("", 0.1)]));
        let w2 = record(14, vec![song("A", 1, None, None)], None);
        let series = SeriesBuilder::build(vec![w1, w2], 0.84).unwrap();

        assert_eq!(series.word_frequency.columns(), ["love"]);
        assert_eq!(series.word_frequency.value(day(14), "love"), Some(0.0));
        assert_eq!(series.emotion_frequency.columns().len(), Emotion::COUNT);
        assert!(series.emotion_frequency.rows()[1].values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_summary_bands() {
        let r = record(
            7,
            vec![
                song("A", 1, Some(120_000.0), Some(200)),
                song("B", 2, Some(180_000.0), None),
                song("C", 3, Some(0.0), Some(50)),
                song("D", 4, None, None),
            ],
            Some(vec![]),
        );
        let row = summarize_week(&r, 0.84);
        assert_eq!(row.n_songs, 4);
        assert_eq!(row.n_songs_lyrics_analyzed, 2);
        assert_eq!(row.top_tags, vec![("pop".to_string(), 2)]);

        let duration = row.duration.unwrap();
        assert!((duration.median - 2.5).abs() < 1e-12);

        // only song A has both words and a duration: 200 words in 2 minutes
        let wpm = row.wpm.unwrap();
        assert!((wpm.median - 100.0).abs() < 1e-9);
        assert_eq!(wpm.err_low, 0.0);
        assert_eq!(wpm.err_high, 0.0);

        assert!(row.weeks_on_chart.is_some());
    }

    #[test]
    fn test_summary_without_values_is_none() {
        let mut s = song("A", 1, None, None);
        s.weeks_on_chart = 0;
        let row = summarize_week(&record(7, vec![s], None), 0.84);
        assert!(row.duration.is_none());
        assert!(row.wpm.is_none());
        assert!(row.weeks_on_chart.is_none());
    }

    #[test]
    fn test_summary_record_is_flat() {
        let r = record(
            7,
            vec![song("A", 1, Some(120_000.0), None), song("B", 2, Some(180_000.0), None)],
            None,
        );
        let mut table = SummaryTable::default();
        table.push(summarize_week(&r, 0.84)).unwrap();

        let records = table.to_records();
        let rec = records[0].as_object().unwrap();
        assert_eq!(rec["date"], "2023-01-07");
        assert_eq!(rec["n_songs"], 2);
        assert_eq!(rec["top_tags"], "pop");
        assert!((rec["median_duration"].as_f64().unwrap() - 2.5).abs() < 1e-9);
        assert!(rec["err_duration_low"].is_number());
        assert!(rec["err_duration_high"].is_number());
        assert!(rec["median_weeks"].is_number());
        assert!(rec["median_wpm"].is_null());
        assert!(rec["err_wpm_low"].is_null());
        assert!(rec["err_wpm_high"].is_null());
        assert!(rec.values().all(|v| !v.is_object() && !v.is_array()));
        assert_eq!(rec.len(), 13);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        assert!(matches!(
            SeriesBuilder::new(1.2),
            Err(SeriesError::Stats(StatsError::InvalidFraction(_)))
        ));
    }
}
