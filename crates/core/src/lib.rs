//! Core script orchestration for the TradeSignal analytics service.
//!
//! Everything here is free of HTTP concerns: the registry of analysis
//! operations, provisioning of bundled scripts into a scratch directory, and
//! the process execution engine that runs them.

pub mod error;
pub mod scripting;
