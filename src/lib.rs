// Library modules, shared by the binary and the integration tests
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod ocr;
pub mod overlay;
pub mod paths;
pub mod signal;
pub mod transform;
pub mod tray;
pub mod update;
