pub mod agent;
pub mod config;
pub mod coordinator;
pub mod dom;
pub mod generator;
pub mod messaging;
pub mod observer;
pub mod prompt;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod store;

pub use pathmark_common::protocol;
pub use pathmark_common::record;
