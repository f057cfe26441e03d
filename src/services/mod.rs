//! Business logic services

pub mod csv_row;
pub mod import_worker;
pub mod job_queue;
pub mod row_strategy;
pub mod upserter;
