pub mod aggregation;
pub mod alarm;
pub mod event_log;
pub mod sample;
pub mod sampling_gate;
pub mod state_machine;
pub mod weekly_store;
