pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod freshness;
pub mod gate;
pub mod generator;
pub mod guard;
pub mod hooks;
pub mod io;
pub mod paths;
pub mod registry;
pub mod schema;
pub mod scope;
pub mod session;
pub mod state;
pub mod store;
pub mod types;
pub mod workflow;

pub use error::{FlowError, Result};
