pub mod embed;
pub mod files;
pub mod launcher_config;
pub mod logs;
pub mod paths;
pub mod progress;
pub mod retry;
pub mod utils;
pub mod validation;
