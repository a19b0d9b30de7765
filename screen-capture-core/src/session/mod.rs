pub mod capture_session;
pub mod controller;
pub mod picker_adapter;
