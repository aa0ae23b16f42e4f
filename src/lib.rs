//! # bomfactory
//!
//! Load OpenSSF criticality-score data into SQLite, select repositories with
//! ad-hoc filter criteria, and produce SBOMs for the selection.
//!
//! The engine is schema-driven: a fixed registry maps the CSV export's dotted
//! column names to table columns and types. Loading, querying and turning
//! rows back into typed records all go through that one registry.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │ CSV file │──▶│  ingest  │──▶│  SQLite  │──▶│    query    │
//! └──────────┘   └──────────┘   │  repos   │   │ criteria →  │
//!                               └──────────┘   │ materialize │
//!                                              └──────┬──────┘
//!                                                     ▼
//!                                  ┌────────────────────────────────┐
//!                                  │ sbom: clone → generate → save  │
//!                                  └────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bomfactory download-csv
//! bomfactory load --csv data.csv --end 1000
//! bomfactory query --filter repo_language:=:Go --filter repo_star_count:>:50
//! bomfactory download-sbom --filter repo_language:=:Go --max-results 10
//! bomfactory validate-sbom --dir sbom
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`schema`] | Column registry: external names, internal names, types |
//! | [`ingest`] | CSV loader with windowing and conflict policy |
//! | [`criteria`] | `field:operator:value` parsing |
//! | [`query`] | Parameterized statement builder and executor |
//! | [`materialize`] | Store rows into [`models::Repo`] |
//! | [`db`] | Pool setup and cell decoding |
//! | [`migrate`] | Table creation |
//! | [`sbom`] | Clone-and-generate batch driver |
//! | [`purl`] | Package-URL enrichment for SPDX documents |
//! | [`validate`] | SPDX / CycloneDX structural checks |
//! | [`download`] | Source CSV download |
//! | [`config`] | TOML configuration |

pub mod batch;
pub mod config;
pub mod criteria;
pub mod db;
pub mod deadline;
pub mod download;
pub mod error;
pub mod git;
pub mod ingest;
pub mod materialize;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod purl;
pub mod query;
pub mod schema;
pub mod sbom;
pub mod traits;
pub mod validate;
