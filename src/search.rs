//! Scoring, matching and collection.
//!
//! Cursor primitives live in [`doc_id_set`] and [`scorer`]; the boolean and
//! phrase combinators build on them. [`searcher`] drives a query's scorers
//! into a [`collector::Collector`]; [`reference_manager`] and friends manage
//! the lifecycle of searchers over changing indexes.

pub mod bucket;
pub mod collector;
pub mod conjunction;
pub mod disjunction;
pub mod doc_id_set;
pub mod field_collector;
pub mod phrase;
pub mod reference_manager;
pub mod reopen;
pub mod req_excl;
pub mod req_opt;
pub mod scorer;
pub mod searcher;
pub mod searcher_manager;
pub mod similarity;
pub mod term_context;
pub mod time_limit;
