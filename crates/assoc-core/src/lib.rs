pub mod event_log;
pub mod ext;
pub mod paths;
pub mod settings;
pub mod storage;
