pub mod canon;
pub mod completion_service;
pub mod duplicate_guard;
pub mod generator;
pub mod orchestrator;
pub mod progress_service;
pub mod quiz_store;
pub mod reference_selector;
pub mod response_parser;
