pub mod assistant;
pub mod broker;
pub mod errors;
pub mod graph;
pub mod models;
pub mod nodes;
pub mod prompt_template;
pub mod providers;
pub mod session;
pub mod state;
pub mod tools;
