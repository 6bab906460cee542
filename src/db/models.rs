use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analyzer::affect::AffectVector;

/// One weekly chart snapshot as stored by the chart fetcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawWeek {
    pub date: NaiveDate,
    pub data: Vec<RawSongEntry>,
}

/// A single charting song. Listener counts, wiki text etc. are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSongEntry {
    pub song: String,
    pub artist: String,
    pub this_week: u32,
    #[serde(default)]
    pub peak_position: u32,
    #[serde(default)]
    pub weeks_on_chart: u32,
    /// Milliseconds. Last.fm reports 0 (sometimes as a string) when unknown.
    #[serde(default, deserialize_with = "de_duration")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default, alias = "toptags")]
    pub tags: Option<TagField>,
}

/// Tags come either as plain names or in Last.fm's `{"tag": [{"name": ..}]}` shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TagField {
    Names(Vec<String>),
    LastFm { tag: Vec<LastFmTag> },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LastFmTag {
    pub name: String,
}

impl TagField {
    pub fn names(&self) -> Vec<&str> {
        match self {
            TagField::Names(names) => names.iter().map(String::as_str).collect(),
            TagField::LastFm { tag } => tag.iter().map(|t| t.name.as_str()).collect(),
        }
    }
}

fn de_duration<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(ms)) => Some(ms),
        Some(Raw::Float(ms)) if ms.is_finite() && ms >= 0.0 => Some(ms as u64),
        Some(Raw::Text(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

/// Per-song record kept for a week. Missing numbers are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub song: String,
    pub artist: String,
    pub this_week: u32,
    pub peak_position: u32,
    pub weeks_on_chart: u32,
    /// Milliseconds; `None` when absent or zero.
    pub duration: Option<f64>,
    /// Token count before stop-word removal; `None` unless the lyrics were analyzed.
    pub n_words: Option<usize>,
}

/// Everything the series builder needs from one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateWeekRecord {
    pub date: NaiveDate,
    pub n_songs_lyrics_analyzed: usize,
    /// Top tags by raw count, most common first.
    pub tag_fd: Vec<(String, u32)>,
    /// Top lemmas by average per-song frequency. `None` when no lyrics were analyzed.
    pub word_fd_avg: Option<Vec<(String, f64)>>,
    /// Average affect frequencies. `None` when no lyrics were analyzed.
    pub affect_fq_avg: Option<AffectVector>,
    pub songs: Vec<SongRecord>,
}

impl AggregateWeekRecord {
    pub fn n_songs(&self) -> usize {
        self.songs.len()
    }

    pub fn durations(&self) -> Vec<Option<f64>> {
        self.songs.iter().map(|s| s.duration).collect()
    }

    pub fn word_counts(&self) -> Vec<Option<f64>> {
        self.songs.iter().map(|s| s.n_words.map(|n| n as f64)).collect()
    }

    pub fn weeks_on_chart(&self) -> Vec<Option<f64>> {
        self.songs
            .iter()
            .map(|s| Some(s.weeks_on_chart as f64))
            .collect()
    }
}

/// Store statistics.
#[derive(Debug)]
pub struct StoreStats {
    pub snapshots: i64,
    pub first_week: Option<String>,
    pub last_week: Option<String>,
    pub tables: Vec<(String, i64)>,
}
