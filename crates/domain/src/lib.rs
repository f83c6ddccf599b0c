//! # synhome-domain
//!
//! Pure domain model for the synhome command dispatch system.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions
//! - Define **Capabilities** (switch, number, enum) and their validation
//! - Define **Devices** (named capability sets with a coarse state and a command sink)
//! - Define **Operations** produced by the interpretation service, and their repair
//! - Classify instruction text (single, multi-device, group, scene, cross-device)
//! - Describe adapter-side rules: status maps, command/topic templates, reconnect policy
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod capability;
pub mod classifier;
pub mod device;
pub mod discovery;
pub mod operation;
pub mod outcome;
pub mod reconnect;
pub mod status_map;
pub mod template;
