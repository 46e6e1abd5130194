mod runner;
mod types;


pub use runner::Watchdog;
pub use types::RunOutcome;
