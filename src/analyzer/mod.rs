pub mod affect;
pub mod aggregate;
pub mod features;
pub mod tally;
pub mod text;

use crate::config::PipelineConfig;
use crate::db::models::{AggregateWeekRecord, RawWeek};
use affect::{AffectScorer, LexiconAffectScorer};
use aggregate::WeekAggregator;
use features::{SongFeatureExtractor, WeekAccumulator};
use indicatif::{ProgressBar, ProgressStyle};
use text::{TextNormalizer, WhatlangClassifier};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Affect lexicon error: {0}")]
    Lexicon(#[from] affect::LexiconError),
    #[error("Unknown target language code {0:?}")]
    Language(String),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Turns raw weekly snapshots into `AggregateWeekRecord`s.
///
/// Holds no per-week state, so one extractor is shared across worker threads.
pub struct WeekExtractor {
    normalizer: TextNormalizer,
    scorer: Box<dyn AffectScorer>,
    aggregator: WeekAggregator,
}

impl WeekExtractor {
    pub fn new(
        normalizer: TextNormalizer,
        scorer: Box<dyn AffectScorer>,
        aggregator: WeekAggregator,
    ) -> Self {
        Self {
            normalizer,
            scorer,
            aggregator,
        }
    }

    /// Build the production extractor: whatlang detection, configured lexicon.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AnalyzeError> {
        if whatlang::Lang::from_code(&config.target_language).is_none() {
            return Err(AnalyzeError::Language(config.target_language.clone()));
        }

        let scorer = match &config.lexicon_path {
            Some(path) => {
                log::info!("Affect lexicon: {}", path.display());
                LexiconAffectScorer::from_nrc_file(path)?
            }
            None => LexiconAffectScorer::builtin(),
        };

        Ok(Self::new(
            TextNormalizer::new(Box::new(WhatlangClassifier), &config.target_language),
            Box::new(scorer),
            WeekAggregator {
                top_words: config.top_words,
                top_tags: config.top_tags,
            },
        ))
    }

    /// Extract one week. Each call owns its own accumulator.
    pub fn extract_week(&self, week: &RawWeek) -> AggregateWeekRecord {
        let extractor = SongFeatureExtractor::new(&self.normalizer, self.scorer.as_ref());
        let mut acc = WeekAccumulator::new();
        for entry in &week.data {
            extractor.extract(entry, &mut acc);
        }

        log::debug!(
            "Week {}: {} songs, {} with analyzed lyrics",
            week.date,
            acc.songs.len(),
            acc.n_songs_lyrics_analyzed
        );

        self.aggregator.finish(week.date, acc)
    }

    /// Extract many weeks in parallel. Output order matches input order.
    pub fn extract_weeks(
        &self,
        weeks: &[RawWeek],
        jobs: usize,
    ) -> Result<Vec<AggregateWeekRecord>, AnalyzeError> {
        if weeks.is_empty() {
            return Ok(Vec::new());
        }

        log::info!("Extracting {} weeks with {} workers", weeks.len(), jobs);

        let pb = ProgressBar::new(weeks.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} weeks ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        let records: Vec<AggregateWeekRecord> = pool.install(|| {
            use rayon::prelude::*;
            weeks
                .par_iter()
                .map(|week| {
                    let record = self.extract_week(week);
                    pb.inc(1);
                    record
                })
                .collect()
        });

        pb.finish_with_message("done");
        Ok(records)
    }
}
