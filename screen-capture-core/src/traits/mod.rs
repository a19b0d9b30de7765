pub mod capture_delegate;
pub mod capture_service;
pub mod picker_source;
