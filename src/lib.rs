//! Market positioning for short-term rental listings.
//!
//! [`distribution::build`] turns a reference collection into per-scope
//! distributions and summary statistics; [`positioning::analyze`] ranks one
//! listing against them and produces an [`models::AnalysisReport`]. Both are
//! pure. Loading, storage and rendering live in [`listings`], [`db`] and
//! [`report`].

pub mod cache;
pub mod db;
pub mod distribution;
pub mod listings;
pub mod models;
pub mod positioning;
pub mod report;
pub mod scoring;
