pub mod config_loader;
pub mod decision;
pub mod directory;
pub mod handoff;
pub mod platform;
pub mod reconcile;
