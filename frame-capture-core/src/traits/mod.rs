pub mod capture_observer;
pub mod frame_source;
