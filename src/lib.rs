pub mod assistant;
pub mod database;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod explainer;
pub mod intent;
pub mod llm;
pub mod model;
pub mod normalizer;
pub mod reducer;
pub mod semantic_parsing;
pub mod settings;
pub mod surface;
pub mod vocabulary;
pub mod web;
