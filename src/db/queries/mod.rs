//! Database queries

pub mod stock;
