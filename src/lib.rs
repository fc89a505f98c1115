//! # Scholar Match
//!
//! A hybrid researcher recommendation engine. Given a user and a free-text
//! research need, it ranks other researchers worth an introduction by
//! combining semantic retrieval over author profiles, co-authorship
//! proximity, and publication recency, with an optional LLM rerank pass that
//! always falls back to the heuristic order.
//!
//! ## Architecture
//!
//! ```text
//! authors_data ──▶ Vectorizer ──▶ VectorIndex ─┐
//!        │                                     ├──▶ Snapshot (Arc, swapped on refresh)
//!        └───────▶ CoauthorGraph ──────────────┘            │
//!                                                           ▼
//!        query ──▶ search_by_text ──▶ HeuristicRanker ──▶ LlmReranker ──▶ results
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! smatch validate
//! smatch recommend 42 "graph neural networks for chemistry"
//! smatch serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Author records, candidates, ranked results |
//! | [`dataset`] | `authors_data` JSON parsing and validation |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`vectorize`] | Per-author centroid vectors |
//! | [`index`] | Exact inner-product vector index |
//! | [`graph`] | Co-authorship graph |
//! | [`ranking`] | Heuristic scoring and recency decay |
//! | [`llm`] | LLM provider abstraction |
//! | [`rerank`] | LLM rerank with heuristic fallback |
//! | [`engine`] | Snapshot lifecycle and the recommendation façade |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`server`] | HTTP server |

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod graph;
pub mod index;
pub mod llm;
pub mod models;
pub mod ranking;
pub mod rerank;
pub mod server;
pub mod vectorize;
