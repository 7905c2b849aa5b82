//! Loan Approval Prediction API Library
//!
//! This library turns applicant details into the feature record a trained
//! gradient-boosting model expects, scores it, and serves descriptive
//! statistics over the historical applications the model was trained on.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: Model and dataset collaborators.
//! - `classifier`: Classifier trait and gradient-boosted tree evaluator.
//! - `config`: Configuration management.
//! - `dataset`: Historical dataset and its statistics.
//! - `derivation`: Derived financial fields.
//! - `errors`: Error handling types.
//! - `features`: Feature record assembly.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `prediction`: Prediction workflow and caching.
//! - `validation`: Applicant input validation.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod derivation;
pub mod errors;
pub mod features;
pub mod handlers;
pub mod models;
pub mod prediction;
pub mod validation;
