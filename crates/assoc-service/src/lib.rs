pub mod discovery;
pub mod engine;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod resolver;
pub mod restore;
