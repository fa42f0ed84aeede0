// Application layer - Use cases and the ports they depend on
pub mod alerts;
pub mod backend_api;
pub mod clock;
pub mod commands;
pub mod decoder;
pub mod history;
pub mod monitoring_service;
pub mod reconnect;
pub mod scheduler;
pub mod state_store;
pub mod transport;
