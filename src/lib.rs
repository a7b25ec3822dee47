// Chain plumbing shared by every transaction path
pub mod chain;

// Startup configuration
pub mod config;

// Dashboard API and observer feed
pub mod dashboard;

// Simulated cycles for credential-less runs
pub mod demo;

// Claim → swap → burn orchestration
pub mod engine;

// Single write path for observable and durable state
pub mod ledger;

// Re-export commonly used types for convenience
pub use config::Config;
pub use engine::Engine;
pub use ledger::Ledger;
