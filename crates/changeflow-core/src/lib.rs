pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod observer;
pub mod operation;
pub mod sequence;
pub mod source;
pub mod stream;
pub mod suppression;
pub mod telemetry;
pub mod value;

pub use config::{ConfigError, LoggingConfig, ObservationConfig, ObserverSettings};
pub use error::*;
pub use filter::*;
pub use observer::*;
pub use operation::*;
pub use sequence::*;
pub use source::*;
pub use stream::*;
pub use suppression::*;
pub use telemetry::init_tracing;
pub use value::*;
