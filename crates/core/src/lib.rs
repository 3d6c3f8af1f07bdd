pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod poi;
pub mod series;

pub use config::DisaggConfig;
pub use context::*;
pub use error::*;
pub use event::*;
pub use poi::*;
pub use series::*;
