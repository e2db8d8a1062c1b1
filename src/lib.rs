//! Persistence core for an events gallery: events with image galleries,
//! a public visibility flag and a single hero poster per event, stored in a
//! JSON document or a relational database.

pub mod admin;
pub mod common;
pub mod config;
pub mod events;
pub mod images;
pub mod store;
