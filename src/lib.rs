//! # Documentation Build Library
//!
//! This library provides the core of the `docbuild` command-line tool: it
//! stitches scattered XML configuration fragments into one checked tree,
//! resolves doctype selectors into concrete deliverables, builds them with an
//! external tool against local git mirrors, and aggregates the results into
//! per-product manifests.
//!
//! ## Quick Example
//!
//! ```
//! use docbuild::doctype::Doctype;
//! use docbuild::resolve::resolve;
//! use docbuild::xml::{parse_str, stitch::StitchedTree};
//!
//! let root = parse_str(r#"<docservconfig>
//!   <product productid="sles">
//!     <docset setid="15-SP6" lifecycle="supported">
//!       <builddocs>
//!         <git remote="https://github.com/SUSE/doc-sle.git"/>
//!         <language lang="en-us" default="1">
//!           <deliverable><dc>DC-SLES-admin</dc></deliverable>
//!         </language>
//!       </builddocs>
//!     </docset>
//!   </product>
//! </docservconfig>"#).unwrap();
//! let tree = StitchedTree::from_root(root);
//!
//! let doctype: Doctype = "sles/*/en-us".parse().unwrap();
//! let deliverables = resolve(&tree, &doctype);
//! assert_eq!(deliverables.len(), 1);
//! assert_eq!(deliverables[0].branch, "main");
//! ```
//!
//! ## Core Concepts
//!
//! - **Stitching (`xml::stitch`)**: Parses every fragment, expands
//!   `xi:include` directives and merges the fragments under one root, failing
//!   on duplicate product ids and broken `<ref>` links.
//! - **Doctypes (`doctype`)**: `product/docsets@lifecycle/langs` selectors.
//! - **Resolution (`resolve`)**: Turns a doctype into [`deliverable::Deliverable`]s.
//! - **Repository Management (`repository`, `git`, `repo`)**: Keeps one bare
//!   mirror per remote and checks out branches from it.
//! - **Processing (`processor`, `coordinator`)**: Runs the build tool per
//!   deliverable, with bounded concurrency and fail-fast or collect-all
//!   semantics.
//! - **Aggregation (`manifest`)**: Writes one manifest per product docset.
//!
//! ## Execution Flow
//!
//! The main entry point is [`pipeline::run_metadata`]:
//!
//! 1.  **Stitching**: Load and merge the fragments of the configuration directory.
//! 2.  **Resolution**: Select the deliverables matching the requested doctypes.
//! 3.  **Mirrors**: Clone each distinct repository once.
//! 4.  **Processing**: Build every deliverable in its own checkout.
//! 5.  **Aggregation**: Combine the per-deliverable metadata into manifests.

pub mod availability;
pub mod config;
pub mod coordinator;
pub mod defaults;
pub mod deliverable;
pub mod doctype;
pub mod error;
pub mod git;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod repo;
pub mod repository;
pub mod resolve;
pub mod workdir;
pub mod xml;
