pub mod clean;
pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod table;
