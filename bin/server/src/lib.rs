//! parley server.
//!
//! This crate wires the conversation service to Telegram: webhook and
//! long-polling ingestion, event dispatch, reply delivery, Postgres-backed
//! stores and the health endpoint.

pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod outbound;
pub mod routes;
pub mod telegram;
