pub mod driver;
pub mod request;
pub mod trip;
