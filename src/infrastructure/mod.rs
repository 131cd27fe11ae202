pub mod gateio_client;
pub mod mock;
