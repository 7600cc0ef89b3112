//! Otter - hierarchical, attribute-scoped authorization engine
//!
//! Subjects, resources and specifiers live in an in-memory graph; policies
//! grant an action from a subject to a resource under a specifier scope.
//! The library exposes the graph, the four queries (Can, WhoCan, WhatCan,
//! HowCan) and an HTTP API over them.

pub mod authz;
pub mod errors;
pub mod settings;
pub mod web;
