pub mod cipher;
pub mod config;
pub mod connection;
pub mod constants;
pub mod controller;
pub mod error;
pub mod keys;
pub mod sensordata;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, Credentials, Region};
pub use connection::{ApiRequest, Connection};
pub use controller::Controller;
pub use error::{ErrorKind, MazdaError};
