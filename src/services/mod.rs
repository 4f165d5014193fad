pub mod chat;
pub mod cover;
pub mod document;
pub mod llm;
pub mod planner;
pub mod renderer;
pub mod workflow;

#[cfg(test)]
pub(crate) mod mock;
