//! Co-authorship graph derived from publication author lists.
//!
//! `direct[u]` is every id listed on any of `u`'s own publications, minus
//! `u`. `second_degree[u]` is the union of `direct[v]` for `v ∈ direct[u]`,
//! minus `direct[u]` and `u`. Separately sourced co-author lists on the
//! records are ignored so the graph has a single source of truth.

use std::collections::{BTreeSet, HashMap};

use crate::models::{AuthorId, AuthorsData, ConnectionLabel};

#[derive(Debug, Clone, Default)]
pub struct CoauthorGraph {
    direct: HashMap<AuthorId, BTreeSet<AuthorId>>,
    second_degree: HashMap<AuthorId, BTreeSet<AuthorId>>,
}

impl CoauthorGraph {
    pub fn build(authors: &AuthorsData) -> Self {
        let mut direct: HashMap<AuthorId, BTreeSet<AuthorId>> = HashMap::new();
        for (id, record) in authors {
            let neighbours: BTreeSet<AuthorId> = record
                .publications
                .iter()
                .flat_map(|p| p.author_ids.iter())
                .filter(|other| *other != id)
                .cloned()
                .collect();
            direct.insert(id.clone(), neighbours);
        }

        let mut second_degree = HashMap::new();
        for (id, neighbours) in &direct {
            let mut reach = BTreeSet::new();
            for via in neighbours {
                if let Some(theirs) = direct.get(via) {
                    reach.extend(
                        theirs
                            .iter()
                            .filter(|c| *c != id && !neighbours.contains(*c))
                            .cloned(),
                    );
                }
            }
            second_degree.insert(id.clone(), reach);
        }

        Self {
            direct,
            second_degree,
        }
    }

    pub fn direct(&self, id: &AuthorId) -> Option<&BTreeSet<AuthorId>> {
        self.direct.get(id)
    }

    pub fn second_degree(&self, id: &AuthorId) -> Option<&BTreeSet<AuthorId>> {
        self.second_degree.get(id)
    }

    /// Relation of `candidate` to `requester`. Unknown requesters have no
    /// connections.
    pub fn connection(&self, requester: &AuthorId, candidate: &AuthorId) -> ConnectionLabel {
        if self.direct(requester).is_some_and(|s| s.contains(candidate)) {
            ConnectionLabel::CoAuthor
        } else if self
            .second_degree(requester)
            .is_some_and(|s| s.contains(candidate))
        {
            ConnectionLabel::SecondDegree
        } else {
            ConnectionLabel::NewConnection
        }
    }

    /// Number of directed co-author edges.
    pub fn edge_count(&self) -> usize {
        self.direct.values().map(BTreeSet::len).sum()
    }
}
