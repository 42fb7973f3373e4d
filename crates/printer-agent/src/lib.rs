pub mod agent;
pub mod job;

pub use agent::Agent;
pub use job::PrintJob;
