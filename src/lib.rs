pub mod error;
pub mod media;
pub mod orm;
pub mod schools;
pub mod server;
pub mod settings;
pub mod template;
