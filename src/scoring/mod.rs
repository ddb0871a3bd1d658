/*!
 * Truthfulness scoring.
 *
 * - `similarity`: embedding backends and cosine similarity
 * - `engine`: per-pair score series over aligned lines
 * - `report`: per-backend CSV report and metadata
 */

pub use self::engine::{ScoreSeries, ScoringEngine};
pub use self::report::{Report, ReportAggregator, ReportPaths};
pub use self::similarity::{create_similarity, Embedding, HashedNgramEmbedder, SimilarityBackend};

pub mod engine;
pub mod report;
pub mod similarity;
