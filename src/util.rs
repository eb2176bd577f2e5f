pub mod event_log;
pub mod write_bytes;
