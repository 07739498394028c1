pub mod analysis_flow;
pub mod analysis_service;
