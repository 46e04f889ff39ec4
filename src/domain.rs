pub mod credentials;
pub mod history;
pub mod inbound;
pub mod outbound;
pub mod provider;
pub mod registry;
pub mod repository;
pub mod tasks;
