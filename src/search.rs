//! Corpus discovery and ranked melody search

use crate::analysis::{IntervalPoint, IntervalVector, MatchResult};
use crate::config::MatchingConfig;
use crate::contour;
use crate::dtw::{windowed_distance, WindowParams};
use crate::error::{HumError, Result as HumErrorResult};
use crate::midi::parse_midi_file;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Result of ranking a corpus against one query
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The corpus held no candidate files
    EmptyCorpus,
    /// Candidates sorted by ascending distance
    Ranked(Vec<MatchResult>),
}

impl SearchOutcome {
    pub fn results(&self) -> &[MatchResult] {
        match self {
            SearchOutcome::EmptyCorpus => &[],
            SearchOutcome::Ranked(results) => results,
        }
    }

    pub fn into_results(self) -> Vec<MatchResult> {
        match self {
            SearchOutcome::EmptyCorpus => Vec::new(),
            SearchOutcome::Ranked(results) => results,
        }
    }

    pub fn is_empty_corpus(&self) -> bool {
        matches!(self, SearchOutcome::EmptyCorpus)
    }
}

/// List candidate files in `dir` with the given extension, sorted by file name
pub fn discover_corpus(dir: &Path, extension: &str) -> HumErrorResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        HumError::CorpusError(format!("Cannot read corpus {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| HumError::CorpusError(format!("Cannot list {}: {}", dir.display(), e)))?
            .path();
        let matches_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches_ext && path.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Display identifier of a candidate: its file name
fn file_identifier(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ranks candidate melodies against a query with windowed DTW
#[derive(Debug, Clone)]
pub struct MelodySearch {
    params: WindowParams,
    sentinel: f64,
    parallel: bool,
}

impl MelodySearch {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            params: WindowParams::from(config),
            sentinel: config.sentinel_distance,
            parallel: config.parallel,
        }
    }

    /// Windowed DTW distance with "no alignment" mapped to the sentinel
    pub fn score_pair(&self, query: &[IntervalPoint], candidate: &[IntervalPoint]) -> f64 {
        let distance = windowed_distance(query, candidate, self.params);
        if distance.is_finite() {
            distance
        } else {
            self.sentinel
        }
    }

    /// Score pre-encoded candidates and sort them, ties kept in input order
    pub fn rank_contours(
        &self,
        query: &[IntervalPoint],
        candidates: &[(String, IntervalVector)],
    ) -> Vec<MatchResult> {
        let score = |(file, contour): &(String, IntervalVector)| MatchResult {
            file: file.clone(),
            distance: self.score_pair(query, contour),
        };

        let results: Vec<MatchResult> = if self.parallel {
            candidates.par_iter().map(score).collect()
        } else {
            candidates.iter().map(score).collect()
        };
        sort_results(results)
    }

    /// Parse, encode and score every candidate file against the query file.
    ///
    /// An unreadable query is an error. Unreadable or note-less candidates get the
    /// sentinel distance and the batch continues.
    pub fn rank_files(&self, query_path: &Path, candidates: &[PathBuf]) -> HumErrorResult<SearchOutcome> {
        if candidates.is_empty() {
            log::warn!("No candidate files to compare against");
            return Ok(SearchOutcome::EmptyCorpus);
        }

        let query = parse_midi_file(query_path)?;
        if query.notes.len() < 2 {
            log::warn!(
                "Query {} has {} notes, no contour to match",
                query_path.display(),
                query.notes.len()
            );
        }
        let query_contour = contour::encode(&query.notes);

        let score = |path: &PathBuf| {
            let file = file_identifier(path);
            let distance = match parse_midi_file(path) {
                Ok(parsed) => self.score_pair(&query_contour, &contour::encode(&parsed.notes)),
                Err(e) => {
                    log::warn!("Skipping candidate {}: {}", path.display(), e);
                    self.sentinel
                }
            };
            MatchResult { file, distance }
        };

        let results: Vec<MatchResult> = if self.parallel {
            candidates.par_iter().map(score).collect()
        } else {
            candidates.iter().map(score).collect()
        };

        log::info!("Scored {} candidates", results.len());
        Ok(SearchOutcome::Ranked(sort_results(results)))
    }

    /// Rank every candidate file found in `corpus_dir`
    pub fn search_corpus(
        &self,
        query_path: &Path,
        corpus_dir: &Path,
        extension: &str,
    ) -> HumErrorResult<SearchOutcome> {
        let candidates = discover_corpus(corpus_dir, extension)?;
        self.rank_files(query_path, &candidates)
    }
}

/// Stable ascending sort by distance
fn sort_results(mut results: Vec<MatchResult>) -> Vec<MatchResult> {
    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    results
}
