//! Pin Center - cloud companion for the Ai Pin
//!
//! Talks to the Ai Pin cloud backend on behalf of a signed-in user: keeps
//! a session alive, lists and mutates captures, notes and events, and
//! presents captures and notes as incrementally loaded, searchable
//! collections.

pub mod api;
pub mod config;
pub mod logging;
pub mod media;
pub mod models;
pub mod repository;
