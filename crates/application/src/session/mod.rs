mod actor;
mod manager;

pub use domain::config::SessionConfig;
pub use manager::SessionManager;
