use crate::db::models::{RawSongEntry, SongRecord};

use super::affect::{AffectScorer, AffectVector};
use super::tally::Tally;
use super::text::TextNormalizer;

/// Running sums for one chart week. Consumed by the aggregator.
#[derive(Debug, Default)]
pub struct WeekAccumulator {
    /// Sum over analyzed songs of count(lemma) / n_words.
    pub word_freq_sum: Tally<f64>,
    pub affect_sum: AffectVector,
    pub tag_counts: Tally<u32>,
    pub n_songs_lyrics_analyzed: usize,
    pub songs: Vec<SongRecord>,
}

impl WeekAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-song feature extraction: chart fields, lyric word frequencies, affect, tags.
pub struct SongFeatureExtractor<'a> {
    normalizer: &'a TextNormalizer,
    scorer: &'a dyn AffectScorer,
}

impl<'a> SongFeatureExtractor<'a> {
    pub fn new(normalizer: &'a TextNormalizer, scorer: &'a dyn AffectScorer) -> Self {
        Self { normalizer, scorer }
    }

    /// Fold one entry into the week's accumulator.
    pub fn extract(&self, entry: &RawSongEntry, acc: &mut WeekAccumulator) {
        if let Some(tags) = &entry.tags {
            for name in tags.names() {
                acc.tag_counts.add(name, 1);
            }
        }

        let mut n_words = None;
        if let Some(lyrics) = entry.lyrics.as_deref() {
            if let Some(normalized) = self.normalizer.normalize(lyrics) {
                let total = normalized.n_words() as f64;

                let mut counts: Tally<u32> = Tally::new();
                for lemma in &normalized.lemmas {
                    counts.add(lemma, 1);
                }
                for (lemma, count) in counts.iter() {
                    acc.word_freq_sum.add(lemma, count as f64 / total);
                }

                acc.affect_sum += self.scorer.score(&normalized.tokens);
                acc.n_songs_lyrics_analyzed += 1;
                n_words = Some(normalized.n_words());
            } else {
                log::debug!("Lyrics not analyzed: {} - {}", entry.artist, entry.song);
            }
        }

        acc.songs.push(SongRecord {
            song: entry.song.clone(),
            artist: entry.artist.clone(),
            this_week: entry.this_week,
            peak_position: entry.peak_position,
            weeks_on_chart: entry.weeks_on_chart,
            duration: entry.duration.filter(|&ms| ms != 0).map(|ms| ms as f64),
            n_words,
        });
    }
}
