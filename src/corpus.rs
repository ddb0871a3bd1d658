/*!
 * Parallel corpus storage.
 *
 * A corpus is the ordered list of sentences for one language. Line index is the
 * alignment key across languages; nothing here verifies that the datasets are
 * actually parallel.
 */

use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::CorpusError;
use crate::file_utils::FileManager;

/// Ordered sentences of one language, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    language: String,
    lines: Vec<String>,
}

impl Corpus {
    /// Build a corpus from already split lines
    pub fn from_lines<S: Into<String>>(language: impl Into<String>, lines: Vec<S>) -> Self {
        Self {
            language: language.into(),
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse file content: one sentence per line, terminators and surrounding whitespace stripped
    pub fn parse(language: impl Into<String>, content: &str) -> Self {
        Self {
            language: language.into(),
            lines: content.lines().map(|line| line.trim().to_string()).collect(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines that carry text
    pub fn non_empty_count(&self) -> usize {
        self.lines.iter().filter(|l| !l.is_empty()).count()
    }

    /// The corpus with empty lines removed, matching a skip-empty translation output
    pub fn non_empty_view(&self) -> Vec<String> {
        self.lines.iter().filter(|l| !l.is_empty()).cloned().collect()
    }
}

/// Loads corpora from `{root}/{code}.{extension}` and shares them read-only
pub struct CorpusStore {
    root: PathBuf,
    extension: String,
    corpora: RwLock<HashMap<String, Arc<Corpus>>>,
}

impl CorpusStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
            corpora: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the corpus file for a language
    pub fn path_for(&self, language: &str) -> PathBuf {
        self.root.join(format!("{}.{}", language, self.extension))
    }

    /// Read the corpus file for a language into memory, replacing any earlier load
    pub fn load(&self, language: &str) -> Result<Arc<Corpus>, CorpusError> {
        let path = self.path_for(language);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CorpusError::NotFound {
                    language: language.to_string(),
                    path: path.clone(),
                }
            } else {
                CorpusError::Read {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let corpus = Corpus::parse(language, &content);
        debug!(
            "Loaded corpus '{}' from {:?}: {} lines ({} empty)",
            language,
            path,
            corpus.len(),
            corpus.len() - corpus.non_empty_count()
        );

        Ok(self.insert(corpus))
    }

    /// Get a previously loaded corpus
    pub fn get(&self, language: &str) -> Result<Arc<Corpus>, CorpusError> {
        self.corpora
            .read()
            .get(language)
            .cloned()
            .ok_or_else(|| CorpusError::NotLoaded(language.to_string()))
    }

    /// Get a corpus, loading it on first use
    pub fn get_or_load(&self, language: &str) -> Result<Arc<Corpus>, CorpusError> {
        match self.get(language) {
            Ok(corpus) => Ok(corpus),
            Err(CorpusError::NotLoaded(_)) => self.load(language),
            Err(e) => Err(e),
        }
    }

    /// Register an in-memory corpus
    pub fn insert(&self, corpus: Corpus) -> Arc<Corpus> {
        let corpus = Arc::new(corpus);
        self.corpora
            .write()
            .insert(corpus.language().to_string(), corpus.clone());
        corpus
    }

    /// Load every corpus file under the root; the language is the file name prefix before the first '.'
    pub fn load_all(&self) -> anyhow::Result<Vec<String>> {
        let mut languages = Vec::new();

        for path in FileManager::find_files(&self.root, &self.extension)? {
            let Some(language) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.split('.').next())
                .filter(|prefix| !prefix.is_empty())
            else {
                continue;
            };

            self.load(language)?;
            languages.push(language.to_string());
        }

        info!("Loaded {} corpora from {:?}", languages.len(), self.root);
        Ok(languages)
    }

    /// Languages currently held in memory, sorted
    pub fn loaded_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.corpora.read().keys().cloned().collect();
        languages.sort();
        languages
    }
}
