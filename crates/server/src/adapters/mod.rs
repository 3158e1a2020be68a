//! Concrete collaborators behind the core ports.

pub mod catalog;
pub mod payments;
pub mod shipping;

pub use catalog::TomlCatalog;
pub use payments::MercadoPagoGateway;
pub use shipping::ViaCepDistanceLookup;
