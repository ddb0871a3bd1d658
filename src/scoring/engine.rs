/*!
 * Per-pair scoring of a translation against its original.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use crate::errors::{JobError, SimilarityError};
use crate::file_utils::FileManager;
use crate::scoring::similarity::SimilarityBackend;
use crate::translation::job::LanguagePairKey;

const PROGRESS_INTERVAL: usize = 100;

/// Similarity scores for one language pair, aligned by line index
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSeries {
    pub pair: LanguagePairKey,
    pub scores: Vec<f64>,
    pub original_len: usize,
    pub translated_len: usize,
    /// Lines past the shorter side that could not be compared
    pub dropped: usize,
}

impl ScoreSeries {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Mean score, or `None` for an empty series
    pub fn mean(&self) -> Option<f64> {
        if self.scores.is_empty() {
            None
        } else {
            Some(self.scores.iter().sum::<f64>() / self.scores.len() as f64)
        }
    }
}

pub struct ScoringEngine {
    similarity: Arc<dyn SimilarityBackend>,
    concurrent_requests: usize,
}

impl ScoringEngine {
    pub fn new(similarity: Arc<dyn SimilarityBackend>, concurrent_requests: usize) -> Self {
        Self {
            similarity,
            concurrent_requests: concurrent_requests.max(1),
        }
    }

    pub fn similarity_id(&self) -> String {
        self.similarity.id()
    }

    /// Compare `original[i]` with `translated[i]` over the common length
    pub async fn score(
        &self,
        pair: &LanguagePairKey,
        original: &[String],
        translated: &[String],
    ) -> Result<ScoreSeries, SimilarityError> {
        let common = original.len().min(translated.len());
        let dropped = original.len().max(translated.len()) - common;
        if dropped > 0 {
            info!(
                "{}: original has {} lines, translation has {}; scoring the first {}",
                pair,
                original.len(),
                translated.len(),
                common
            );
        }

        let (min, max) = self.similarity.bounds();
        let mut results = stream::iter(0..common)
            .map(|index| {
                let similarity = Arc::clone(&self.similarity);
                async move {
                    let a = similarity.embed(&original[index]).await?;
                    let b = similarity.embed(&translated[index]).await?;
                    Ok::<f64, SimilarityError>(similarity.similarity(&a, &b)?.clamp(min, max))
                }
            })
            .buffered(self.concurrent_requests);

        let mut scores = Vec::with_capacity(common);
        while let Some(score) = results.next().await {
            scores.push(score?);
            if scores.len() % PROGRESS_INTERVAL == 0 {
                info!("{}: processed {} of {} lines", pair, scores.len(), common);
            }
        }

        debug!("{}: scored {} lines", pair, scores.len());
        Ok(ScoreSeries {
            pair: pair.clone(),
            scores,
            original_len: original.len(),
            translated_len: translated.len(),
            dropped,
        })
    }

    /// Score a translation file on disk against `original`
    pub async fn score_file(
        &self,
        pair: &LanguagePairKey,
        original: &[String],
        translated_path: &Path,
    ) -> Result<ScoreSeries, JobError> {
        let translated =
            FileManager::read_lines(translated_path).map_err(|e| JobError::persistence(translated_path, e))?;
        Ok(self.score(pair, original, &translated).await?)
    }
}
