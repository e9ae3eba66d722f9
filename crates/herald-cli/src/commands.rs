pub mod agents;
pub mod run;
