pub mod bottom_do;
pub mod cli;
pub mod config;
pub mod error;
pub mod filename;
pub mod ftp;
pub mod kkyy;
pub mod ledger;
pub mod models;
pub mod parser;
pub mod retry;
pub mod scheduler;
pub mod transfer;
