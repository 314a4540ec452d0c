// Market data: candles, buffers, timeframes
pub mod market;

// Reversible min-max scaling
pub mod scaling;

// Requests and miner payloads
pub mod prediction;
pub mod requests;
pub mod synapse;

// Neurons and validator identity
pub mod network;

// Client-Miner-Weight ledger
pub mod ledger;

// Grading and weighting
pub mod scoring;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
