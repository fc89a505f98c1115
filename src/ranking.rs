//! Heuristic ranker: semantic score blended with social proximity and
//! publication recency.
//!
//! # Scoring
//!
//! ```text
//! final_score = (vector_score + social_bonus) × time_decay
//! ```
//!
//! | Relation to requester | Bonus | Label |
//! |---|---|---|
//! | direct co-author | 0.25 | `Co-author` |
//! | co-author of a co-author | 0.10 | `2nd degree` |
//! | otherwise | 0.0 | `New connection` |
//!
//! `time_decay` is a step function of years since the candidate's latest
//! publication ([`RecencyDecay`]). Candidates with no dated publication get
//! `1.0`.
//!
//! Results sort by `final_score` (desc), `vector_score` (desc), id (asc).

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::graph::CoauthorGraph;
use crate::models::{AuthorId, AuthorsData, Candidate, ConnectionLabel, RankedResult, ScoreComponents};

/// Additive bonuses for graph proximity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocialWeights {
    pub co_author: f64,
    pub second_degree: f64,
}

impl Default for SocialWeights {
    fn default() -> Self {
        Self {
            co_author: 0.25,
            second_degree: 0.10,
        }
    }
}

/// Named recency step table.
///
/// An age `d = current_year - last_year` maps to:
///
/// | Age | Multiplier |
/// |---|---|
/// | `d <= recent_years` | `recent` |
/// | `d <= moderate_years` | `moderate` |
/// | `d <= stale_years` | `stale` |
/// | otherwise | `very_stale` |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyDecay {
    pub recent_years: i32,
    pub moderate_years: i32,
    pub stale_years: i32,
    pub recent: f64,
    pub moderate: f64,
    pub stale: f64,
    pub very_stale: f64,
}

impl RecencyDecay {
    /// 0–2y → 1.0, 3–5y → 0.85, 6–10y → 0.6, older → 0.4.
    pub fn standard() -> Self {
        Self {
            recent_years: 2,
            moderate_years: 5,
            stale_years: 10,
            recent: 1.0,
            moderate: 0.85,
            stale: 0.6,
            very_stale: 0.4,
        }
    }

    /// Same cutoffs, steeper penalties: 1.0, 0.7, 0.4, 0.2.
    pub fn strict() -> Self {
        Self {
            moderate: 0.7,
            stale: 0.4,
            very_stale: 0.2,
            ..Self::standard()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.recent_years >= 0
            && self.recent_years < self.moderate_years
            && self.moderate_years < self.stale_years)
        {
            return Err(Error::Config(
                "ranking.decay year cutoffs must be >= 0 and strictly increasing".to_string(),
            ));
        }
        let multipliers = [self.recent, self.moderate, self.stale, self.very_stale];
        if multipliers.iter().any(|m| !(*m > 0.0 && *m <= 1.0)) {
            return Err(Error::Config(
                "ranking.decay multipliers must be in (0, 1]".to_string(),
            ));
        }
        if multipliers.windows(2).any(|w| w[1] > w[0]) {
            return Err(Error::Config(
                "ranking.decay multipliers must be non-increasing with age".to_string(),
            ));
        }
        Ok(())
    }

    /// Multiplier for a candidate whose newest publication is `last_year`.
    pub fn factor(&self, last_year: Option<i32>, current_year: i32) -> f64 {
        let Some(last_year) = last_year else {
            return 1.0;
        };
        let age = current_year - last_year;
        if age <= self.recent_years {
            self.recent
        } else if age <= self.moderate_years {
            self.moderate
        } else if age <= self.stale_years {
            self.stale
        } else {
            self.very_stale
        }
    }
}

impl Default for RecencyDecay {
    fn default() -> Self {
        Self::standard()
    }
}

/// Scores retrieval candidates for one requester.
#[derive(Debug, Clone)]
pub struct HeuristicRanker {
    pub social: SocialWeights,
    pub decay: RecencyDecay,
    pub current_year: i32,
}

impl HeuristicRanker {
    pub fn new(social: SocialWeights, decay: RecencyDecay, current_year: i32) -> Self {
        Self {
            social,
            decay,
            current_year,
        }
    }

    /// Score a single candidate. The caller has already removed the requester.
    pub fn score(
        &self,
        candidate: &Candidate,
        requester_id: &AuthorId,
        graph: &CoauthorGraph,
        authors: &AuthorsData,
    ) -> RankedResult {
        let connection = graph.connection(requester_id, &candidate.id);
        let social_bonus = match connection {
            ConnectionLabel::CoAuthor => self.social.co_author,
            ConnectionLabel::SecondDegree => self.social.second_degree,
            ConnectionLabel::NewConnection => 0.0,
        };

        let record = authors.get(&candidate.id);
        let last_year = record.and_then(|a| a.last_publication_year());
        let time_decay = self.decay.factor(last_year, self.current_year);
        let final_score = (candidate.semantic_score + social_bonus) * time_decay;

        RankedResult {
            id: candidate.id.clone(),
            name: record
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            final_score,
            rank: 0,
            components: ScoreComponents {
                vector_score: candidate.semantic_score,
                social_bonus,
                time_decay,
                connection_label: connection,
                last_publication_year: last_year,
            },
            llm_reasoning: None,
        }
    }

    /// Score and sort all candidates, skipping the requester.
    pub fn rank(
        &self,
        candidates: &[Candidate],
        requester_id: &AuthorId,
        graph: &CoauthorGraph,
        authors: &AuthorsData,
    ) -> Vec<RankedResult> {
        let mut results: Vec<RankedResult> = candidates
            .iter()
            .filter(|c| &c.id != requester_id)
            .map(|c| self.score(c, requester_id, graph, authors))
            .collect();
        results.sort_by(compare_results);
        results
    }
}

/// `final_score` desc, then `vector_score` desc, then id asc.
pub fn compare_results(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then(b.components.vector_score.total_cmp(&a.components.vector_score))
        .then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorRecord, PublicationRef};

    fn author(id: i64, pubs: &[(Option<i32>, &[i64])]) -> AuthorRecord {
        AuthorRecord {
            id: AuthorId::Int(id),
            name: format!("Author {}", id),
            interests: vec![],
            bio: None,
            publications: pubs
                .iter()
                .map(|(year, ids)| PublicationRef {
                    title: "paper".to_string(),
                    abstract_text: None,
                    year: *year,
                    author_ids: ids.iter().map(|i| AuthorId::Int(*i)).collect(),
                })
                .collect(),
            coauthors: vec![],
        }
    }

    fn corpus(records: Vec<AuthorRecord>) -> AuthorsData {
        records.into_iter().map(|a| (a.id.clone(), a)).collect()
    }

    fn candidate(id: i64, score: f64) -> Candidate {
        Candidate {
            id: AuthorId::Int(id),
            semantic_score: score,
        }
    }

    #[test]
    fn test_decay_standard_steps() {
        let d = RecencyDecay::standard();
        assert_eq!(d.factor(None, 2026), 1.0);
        assert_eq!(d.factor(Some(2026), 2026), 1.0);
        assert_eq!(d.factor(Some(2024), 2026), 1.0);
        assert_eq!(d.factor(Some(2023), 2026), 0.85);
        assert_eq!(d.factor(Some(2021), 2026), 0.85);
        assert_eq!(d.factor(Some(2020), 2026), 0.6);
        assert_eq!(d.factor(Some(2016), 2026), 0.6);
        assert_eq!(d.factor(Some(2015), 2026), 0.4);
    }

    #[test]
    fn test_decay_future_year_counts_as_recent() {
        assert_eq!(RecencyDecay::standard().factor(Some(2030), 2026), 1.0);
    }

    #[test]
    fn test_decay_non_increasing_with_age() {
        for decay in [RecencyDecay::standard(), RecencyDecay::strict()] {
            let mut prev = f64::INFINITY;
            for age in -2..40 {
                let f = decay.factor(Some(2026 - age), 2026);
                assert!(f <= prev, "decay increased at age {}", age);
                prev = f;
            }
        }
    }

    #[test]
    fn test_presets_within_documented_ranges() {
        for d in [RecencyDecay::standard(), RecencyDecay::strict()] {
            d.validate().unwrap();
            assert!((0.7..=0.85).contains(&d.moderate));
            assert!((0.4..=0.6).contains(&d.stale));
            assert!((0.2..=0.4).contains(&d.very_stale));
        }
    }

    #[test]
    fn test_validate_rejects_bad_cutoffs() {
        let d = RecencyDecay {
            moderate_years: 2,
            ..RecencyDecay::standard()
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_social_bonus_ordering_at_equal_vector_score() {
        // 1 wrote with 2; 2 wrote with 3; 4 is a stranger.
        let authors = corpus(vec![
            author(1, &[(Some(2025), &[1, 2])]),
            author(2, &[(Some(2025), &[1, 2]), (Some(2025), &[2, 3])]),
            author(3, &[(Some(2025), &[2, 3])]),
            author(4, &[(Some(2025), &[4])]),
        ]);
        let graph = CoauthorGraph::build(&authors);
        let ranker = HeuristicRanker::new(SocialWeights::default(), RecencyDecay::standard(), 2026);

        let ranked = ranker.rank(
            &[candidate(4, 0.5), candidate(3, 0.5), candidate(2, 0.5)],
            &AuthorId::Int(1),
            &graph,
            &authors,
        );
        let ids: Vec<AuthorId> = ranked.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![AuthorId::Int(2), AuthorId::Int(3), AuthorId::Int(4)]);
        assert_eq!(ranked[0].components.connection_label, ConnectionLabel::CoAuthor);
        assert_eq!(ranked[1].components.connection_label, ConnectionLabel::SecondDegree);
        assert_eq!(ranked[2].components.connection_label, ConnectionLabel::NewConnection);
        assert!((ranked[0].final_score - 0.75).abs() < 1e-9);
        assert!((ranked[1].final_score - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_formula_applies_decay_to_sum() {
        let authors = corpus(vec![
            author(1, &[(Some(2010), &[1, 2])]),
            author(2, &[(Some(2010), &[1, 2])]),
        ]);
        let graph = CoauthorGraph::build(&authors);
        let ranker = HeuristicRanker::new(SocialWeights::default(), RecencyDecay::standard(), 2026);
        let r = ranker.score(&candidate(2, 0.55), &AuthorId::Int(1), &graph, &authors);
        assert_eq!(r.components.last_publication_year, Some(2010));
        assert_eq!(r.components.time_decay, 0.4);
        assert!((r.final_score - (0.55 + 0.25) * 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_rank_skips_requester() {
        let authors = corpus(vec![author(1, &[]), author(2, &[])]);
        let graph = CoauthorGraph::build(&authors);
        let ranker = HeuristicRanker::new(SocialWeights::default(), RecencyDecay::standard(), 2026);
        let ranked = ranker.rank(
            &[candidate(1, 0.9), candidate(2, 0.1)],
            &AuthorId::Int(1),
            &graph,
            &authors,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, AuthorId::Int(2));
    }

    #[test]
    fn test_ties_break_on_vector_then_id() {
        let authors = corpus(vec![
            author(1, &[]),
            author(5, &[(Some(2015), &[5])]),
            author(6, &[]),
            author(7, &[]),
        ]);
        let graph = CoauthorGraph::build(&authors);
        let ranker = HeuristicRanker::new(SocialWeights::default(), RecencyDecay::standard(), 2026);
        // 5: 0.5 * 0.4 = 0.2; 6 and 7: 0.2 * 1.0 = 0.2.
        let ranked = ranker.rank(
            &[candidate(7, 0.2), candidate(6, 0.2), candidate(5, 0.5)],
            &AuthorId::Int(1),
            &graph,
            &authors,
        );
        let ids: Vec<AuthorId> = ranked.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![AuthorId::Int(5), AuthorId::Int(6), AuthorId::Int(7)]);
    }
}
