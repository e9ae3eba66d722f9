//! These models represent the objects passed around by herald
//!
//! There are two families of formats we need to interact with:
//! - agent messages, the envelope exchanged between the coordinator and the agent services
//! - conversation messages/tools, exchanged between an agent and its LLM provider
//!
//! The agent envelope is plain: a list of parts, each holding text. Conversation
//! messages carry roles, tool requests and tool responses and are converted to the provider
//! wire formats with the helpers in `providers::utils`.
pub mod agent_message;
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
