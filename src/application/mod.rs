// Market windows and miner I/O
pub mod assembler;
pub mod dispatcher;
pub mod time_ranges;

// Scheduling and state
pub mod ledger_service;
pub mod scheduler;

// Workflows and the periodic driver
pub mod system;
pub mod validator;
