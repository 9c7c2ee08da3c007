pub mod agents;
pub mod app;
pub mod blobs;
pub mod config;
pub mod contracts;
pub mod envelope;
pub mod events;
pub mod index;
pub mod orchestrator;
pub mod queue;
pub mod runtime;
pub mod shared;
