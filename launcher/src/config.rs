pub mod embedded_config;
pub mod runtime_config;
