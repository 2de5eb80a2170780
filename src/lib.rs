//! # fm-quickfix: explanations and quick-fixes for feature models
//!
//! A feature model describes a product line as a tree of features with group
//! relations and cross-tree constraints. Models drift into defects:
//!
//! - **dead** features can never be selected;
//! - **false-optional** features are modelled optional but are always selected with their parent;
//! - **redundant** constraints follow from the rest of the model;
//! - **tautologies** hold in every configuration.
//!
//! This crate explains why a defect exists and proposes structural edits
//! ([resolutions][crate::resolution::Resolution]) that remove it.
//!
//! ## Pipeline
//!
//! 1. [`analysis`] compiles the model into a BDD and computes the defect sets.
//! 2. [`explanation`] finds the tree relations and constraints that together
//!    produce a defect, by propagation over the clausified model.
//! 3. [`provider`] matches patterns on those reasons and proposes resolutions.
//! 4. [`quickfix`] drives the recursion over related defects and collects the result.
//! 5. [`resolution`] applies a chosen fix through a transactional [`editor`].
//!
//! ## Example
//!
//! ```rust
//! use fm_quickfix::analysis::{Analyzer, BddAnalyzer};
//! use fm_quickfix::formula::Formula;
//! use fm_quickfix::model::FeatureModel;
//! use fm_quickfix::quickfix::{DefectDescriptor, QuickFix};
//! use fm_quickfix::resolution::ResolutionKind;
//!
//! let mut model = FeatureModel::new("Sentence");
//! model.add_mandatory("Sentence", "Hello")?;
//! model.add_feature("Sentence", "Adjective")?;
//! model.add_constraint(Formula::implies(
//!     Formula::var("Hello"),
//!     Formula::not(Formula::var("Adjective")),
//! ));
//!
//! let analyzer = BddAnalyzer::new(&model);
//! assert!(analyzer.dead_features().contains("Adjective"));
//!
//! let report = QuickFix::new(&model, &analyzer).resolve(&DefectDescriptor::dead("Adjective"));
//! for resolution in &report.resolutions {
//!     println!("{}", resolution.label());
//! }
//! assert!(report.resolutions.contains(&ResolutionKind::DeleteFeature("Adjective".into())));
//! # Ok::<(), fm_quickfix::error::ModelError>(())
//! ```
//!
//! The BDD layer ([`bdd`], [`reference`], [`cache`]) is a small
//! manager-centric ROBDD package with complement edges, used for analysis
//! and for enumerating the satisfying assignments of individual formulas.

pub mod analysis;
pub mod bdd;
pub mod cache;
pub mod cnf;
pub mod containment;
pub mod editor;
pub mod error;
pub mod eval;
pub mod explanation;
pub mod formula;
pub mod implication;
pub mod model;
pub mod paths;
pub mod provider;
pub mod quickfix;
pub mod reference;
pub mod resolution;
pub mod sat;
pub mod types;
pub mod utils;
