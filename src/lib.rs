//! # Parallel Text
//!
//! Document ingestion, fixed-size chunking, weighted regex scoring, and
//! token-overlap search over SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │  Upload   │──▶│ Extractor │──▶│  Chunker   │──▶│  SQLite  │
//! │ txt/docx/ │   │ (worker   │   │ (worker    │   │  chunks  │
//! │ pdf/csv   │   │   pool)   │   │   pool)    │   │  scores  │
//! └───────────┘   └───────────┘   └────────────┘   └────┬─────┘
//!                                                       │
//!              ┌──────────────┬────────────────┬────────┤
//!              ▼              ▼                ▼        ▼
//!        ┌──────────┐  ┌────────────┐  ┌──────────┐ ┌────────┐
//!        │  Rule    │  │  Search    │  │  CSV     │ │  Mail  │
//!        │  engine  │  │  ranker    │  │  export  │ │ (SMTP) │
//!        └──────────┘  └────────────┘  └──────────┘ └────────┘
//! ```
//!
//! Models, the chunker, the rule engine, the ranker, the aggregator and the
//! [`Store`](parallel_text_core::store::Store) trait live in
//! [`parallel_text_core`]. This crate adds I/O around them.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` backend |
//! | [`extract`] | Text extraction per file format |
//! | [`worker`] | Bounded pool for CPU-bound steps |
//! | [`pipeline`] | Upload / analyze / search entry points |
//! | [`export`] | CSV rendering |
//! | [`mail`] | Summary mail over SMTP |
//! | [`get`] | `ptx get` chunk view |
//! | [`search`] | `ptx search` output |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod export;
pub mod extract;
pub mod get;
pub mod mail;
pub mod migrate;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod worker;
