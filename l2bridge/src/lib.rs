pub mod driver;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod ipam;
pub mod logging;
pub mod protocol;
pub mod server;

pub use driver::Driver;
pub use engine::{BridgeEngine, MemoryEngine};
pub use error::{DriverError, ErrorKind};
pub use server::{AppState, create_router};
