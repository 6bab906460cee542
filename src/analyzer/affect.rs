//! Word-level emotion scoring against an NRC-style association lexicon.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::ops::{AddAssign, Div};
use std::path::Path;
use thiserror::Error;

use super::text::lemmatize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Positive,
    Negative,
    Anger,
    Anticipation,
    Disgust,
    Fear,
    Joy,
    Sadness,
    Surprise,
    Trust,
}

impl Emotion {
    pub const COUNT: usize = 10;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Positive,
        Emotion::Negative,
        Emotion::Anger,
        Emotion::Anticipation,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Surprise,
        Emotion::Trust,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Emotion::Positive => "positive",
            Emotion::Negative => "negative",
            Emotion::Anger => "anger",
            Emotion::Anticipation => "anticipation",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Surprise => "surprise",
            Emotion::Trust => "trust",
        }
    }

    pub fn from_name(name: &str) -> Option<Emotion> {
        Emotion::ALL.into_iter().find(|e| e.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Frequency per emotion, always over the full fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AffectVector([f64; Emotion::COUNT]);

impl AffectVector {
    pub fn get(&self, emotion: Emotion) -> f64 {
        self.0[emotion.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.into_iter().map(|e| (e, self.get(e)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

impl AddAssign for AffectVector {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl Div<f64> for AffectVector {
    type Output = AffectVector;

    fn div(self, rhs: f64) -> AffectVector {
        AffectVector(self.0.map(|v| v / rhs))
    }
}

/// Turns a song's tokens into an emotion frequency vector.
pub trait AffectScorer: Send + Sync {
    fn score(&self, tokens: &[String]) -> AffectVector;
}

#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Counts lexicon hits per emotion and divides by the total number of hits.
pub struct LexiconAffectScorer {
    lexicon: HashMap<String, Vec<Emotion>>,
}

impl LexiconAffectScorer {
    /// The small built-in lexicon of common lyric words.
    pub fn builtin() -> Self {
        let lexicon = BUILTIN_LEXICON
            .iter()
            .map(|(word, emotions)| (word.to_string(), emotions.to_vec()))
            .collect();
        Self { lexicon }
    }

    /// Load an NRC word-level file: `word<TAB>emotion<TAB>0|1` per line.
    pub fn from_nrc_file(path: &Path) -> Result<Self, LexiconError> {
        let file = std::fs::File::open(path)?;
        Self::from_nrc_reader(std::io::BufReader::new(file))
    }

    pub fn from_nrc_reader<R: BufRead>(reader: R) -> Result<Self, LexiconError> {
        let mut lexicon: HashMap<String, Vec<Emotion>> = HashMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            let &[word, emotion, flag] = fields.as_slice() else {
                return Err(LexiconError::Parse {
                    line: i + 1,
                    message: format!("expected 3 tab-separated fields, got {}", fields.len()),
                });
            };
            let emotion = Emotion::from_name(emotion).ok_or_else(|| LexiconError::Parse {
                line: i + 1,
                message: format!("unknown emotion {emotion:?}"),
            })?;

            if flag.trim() == "1" {
                lexicon.entry(word.to_lowercase()).or_default().push(emotion);
            }
        }

        log::debug!("Loaded affect lexicon with {} words", lexicon.len());
        Ok(Self { lexicon })
    }

    pub fn len(&self) -> usize {
        self.lexicon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexicon.is_empty()
    }

    fn lookup(&self, token: &str) -> Option<&[Emotion]> {
        self.lexicon
            .get(token)
            .or_else(|| self.lexicon.get(&lemmatize(token)))
            .map(Vec::as_slice)
    }
}

impl AffectScorer for LexiconAffectScorer {
    fn score(&self, tokens: &[String]) -> AffectVector {
        let mut counts = [0.0_f64; Emotion::COUNT];
        let mut total = 0.0;

        for token in tokens {
            if let Some(emotions) = self.lookup(token) {
                for e in emotions {
                    counts[e.index()] += 1.0;
                    total += 1.0;
                }
            }
        }

        if total == 0.0 {
            return AffectVector::default();
        }
        AffectVector(counts.map(|c| c / total))
    }
}

use Emotion::{
    Anger as ANG, Anticipation as ANT, Disgust as DIS, Fear as FEA, Joy as JOY,
    Negative as NEG, Positive as POS, Sadness as SAD, Surprise as SUR, Trust as TRU,
};

static BUILTIN_LEXICON: &[(&str, &[Emotion])] = &[
    ("love", &[JOY, POS]),
    ("lover", &[ANT, JOY, POS, TRU]),
    ("kiss", &[ANT, JOY, POS, SUR]),
    ("happy", &[ANT, JOY, POS, TRU]),
    ("smile", &[JOY, POS, SUR, TRU]),
    ("dance", &[JOY, POS, TRU]),
    ("party", &[ANT, JOY, POS]),
    ("sweet", &[ANT, JOY, POS, SUR, TRU]),
    ("baby", &[JOY, POS]),
    ("beautiful", &[JOY, POS]),
    ("good", &[ANT, JOY, POS, SUR, TRU]),
    ("friend", &[JOY, POS, TRU]),
    ("hope", &[ANT, JOY, POS, SUR, TRU]),
    ("sun", &[ANT, JOY, POS, SUR, TRU]),
    ("shine", &[POS]),
    ("gold", &[POS]),
    ("money", &[ANG, ANT, JOY, POS, SUR, TRU]),
    ("rich", &[POS]),
    ("win", &[ANT, JOY, POS, SUR, TRU]),
    ("true", &[JOY, POS, TRU]),
    ("trust", &[TRU]),
    ("god", &[ANT, FEA, JOY, POS, TRU]),
    ("heaven", &[ANT, JOY, POS, TRU]),
    ("angel", &[ANT, JOY, POS, SUR, TRU]),
    ("wait", &[ANT, NEG]),
    ("fun", &[ANT, JOY, POS]),
    ("laugh", &[JOY, POS, SUR]),
    ("free", &[JOY, POS, TRU]),
    ("celebrate", &[ANT, JOY, POS]),
    ("wild", &[NEG, SUR]),
    ("crazy", &[ANG, FEA, NEG, SAD]),
    ("hate", &[ANG, DIS, FEA, NEG, SAD]),
    ("cry", &[NEG, SAD]),
    ("tear", &[NEG, SAD]),
    ("pain", &[FEA, NEG, SAD]),
    ("hurt", &[ANG, FEA, NEG, SAD]),
    ("lonely", &[ANG, DIS, FEA, NEG, SAD]),
    ("broken", &[ANG, FEA, NEG, SAD]),
    ("lost", &[NEG, SAD]),
    ("die", &[FEA, NEG, SAD]),
    ("dead", &[ANG, DIS, FEA, NEG, SAD]),
    ("death", &[ANG, ANT, DIS, FEA, NEG, SAD, SUR]),
    ("kill", &[FEA, NEG, SAD]),
    ("gun", &[ANG, FEA, NEG]),
    ("shoot", &[ANG, FEA, NEG]),
    ("fight", &[ANG, FEA, NEG]),
    ("war", &[FEA, NEG]),
    ("blood", &[ANG, DIS, FEA, NEG, SAD, SUR]),
    ("fire", &[FEA]),
    ("burn", &[NEG]),
    ("devil", &[ANG, ANT, DIS, FEA, NEG, SAD]),
    ("hell", &[ANG, DIS, FEA, NEG, SAD]),
    ("bad", &[ANG, DIS, FEA, NEG, SAD]),
    ("wrong", &[NEG]),
    ("lie", &[ANG, DIS, NEG, SAD]),
    ("fear", &[ANG, FEA, NEG]),
    ("scared", &[FEA, NEG]),
    ("afraid", &[FEA, NEG]),
    ("mad", &[ANG, DIS, FEA, NEG, SAD]),
    ("angry", &[ANG, DIS, NEG]),
    ("rage", &[ANG, NEG]),
    ("sick", &[DIS, NEG, SAD]),
    ("sad", &[NEG, SAD]),
    ("sorrow", &[NEG, SAD]),
    ("blue", &[SAD]),
    ("goodbye", &[ANT, NEG, SAD]),
    ("leave", &[NEG, SAD, SUR]),
    ("miss", &[NEG, SAD]),
    ("regret", &[NEG, SAD]),
    ("cold", &[NEG]),
    ("dark", &[SAD]),
    ("darkness", &[ANG, FEA, NEG, SAD]),
    ("ghost", &[FEA]),
    ("shame", &[DIS, FEA, NEG, SAD]),
    ("dirty", &[DIS, NEG]),
    ("bitch", &[ANG, DIS, NEG]),
    ("shit", &[ANG, DIS, NEG]),
    ("damn", &[ANG, DIS, NEG]),
    ("sudden", &[SUR]),
    ("surprise", &[FEA, JOY, POS, SUR]),
    ("shock", &[ANG, FEA, NEG, SUR]),
    ("magic", &[ANT, JOY, POS, SUR]),
    ("promise", &[JOY, POS, TRU]),
    ("faith", &[ANT, JOY, POS, TRU]),
    ("truth", &[POS, TRU]),
    ("honey", &[POS]),
    ("pretty", &[ANT, JOY, POS, TRU]),
    ("real", &[POS, TRU]),
    ("star", &[ANT, JOY, POS, TRU]),
    ("young", &[ANT, JOY, POS, SUR]),
    ("late", &[NEG, SAD]),
    ("wish", &[ANT, JOY, POS]),
    ("touch", &[ANT]),
    ("tomorrow", &[ANT]),
    ("soon", &[ANT]),
];
