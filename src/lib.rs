pub mod annotate;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod hmmer;
pub mod labels;
pub mod matrix;
pub mod merge;
pub mod npz;
pub mod output;
pub mod progress;
pub mod reader;
pub mod records;
pub mod regroup;
pub mod store;
