pub mod agent;
pub mod client;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod run;
pub mod systems;
pub mod units;
pub mod workflow;
