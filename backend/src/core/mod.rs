//! Core vocabulary shared by the ledger and the simulator

pub mod time;
