use chrono::NaiveDate;
use thiserror::Error;

use crate::db::models::AggregateWeekRecord;

use super::affect::AffectVector;
use super::features::WeekAccumulator;

#[derive(Error, Debug, PartialEq)]
pub enum AggregateError {
    #[error("No lyrics analyzed for week {0}; cannot average frequencies")]
    InsufficientData(NaiveDate),
}

/// Folds a finished week accumulator into its `AggregateWeekRecord`.
#[derive(Debug, Clone, Copy)]
pub struct WeekAggregator {
    pub top_words: usize,
    pub top_tags: usize,
}

impl Default for WeekAggregator {
    fn default() -> Self {
        Self {
            top_words: 100,
            top_tags: 50,
        }
    }
}

impl WeekAggregator {
    /// Average the top word frequencies and the affect vector over analyzed songs.
    pub fn average(
        &self,
        date: NaiveDate,
        acc: &WeekAccumulator,
    ) -> Result<(Vec<(String, f64)>, AffectVector), AggregateError> {
        if acc.n_songs_lyrics_analyzed == 0 {
            return Err(AggregateError::InsufficientData(date));
        }
        let n = acc.n_songs_lyrics_analyzed as f64;

        let words = acc
            .word_freq_sum
            .most_common(self.top_words)
            .into_iter()
            .map(|(word, sum)| (word, sum / n))
            .collect();

        Ok((words, acc.affect_sum / n))
    }

    pub fn finish(&self, date: NaiveDate, acc: WeekAccumulator) -> AggregateWeekRecord {
        let (word_fd_avg, affect_fq_avg) = match self.average(date, &acc) {
            Ok((words, affect)) => (Some(words), Some(affect)),
            Err(e) => {
                log::warn!("{e}");
                (None, None)
            }
        };

        AggregateWeekRecord {
            date,
            n_songs_lyrics_analyzed: acc.n_songs_lyrics_analyzed,
            tag_fd: acc.tag_counts.most_common(self.top_tags),
            word_fd_avg,
            affect_fq_avg,
            songs: acc.songs,
        }
    }
}
