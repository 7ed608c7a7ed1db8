pub type Error = failure::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
pub mod decoder;
pub mod layout;
pub mod meter;
pub mod session;
pub mod transport;
pub mod usb;
pub mod validator;
