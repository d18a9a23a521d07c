pub mod analysis_export;
pub mod artifacts;
pub mod combined;
pub mod config;
pub mod dataset;
pub mod impute;
pub mod pipeline;
pub mod state;
pub mod stats;
pub mod view;
