pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod payments;
pub mod pricing;
pub mod receipt;
pub mod shipping;
pub mod text;

pub use domain::cart::{Cart, CartLine, RiceVariant, SauceVariant};
pub use domain::catalog::{CatalogError, CatalogSource, Dish, StaticCatalog};
pub use domain::customer::CustomerId;
pub use domain::session::{Checkout, Session};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConversationEngine, ConversationState, Input, Outbound, TransitionOutcome};
pub use payments::{PaymentError, PaymentGateway, PaymentReport, PaymentStatus};
pub use pricing::{format_brl, PricingPolicy};
pub use receipt::{Receipt, ReceiptError, ReceiptRenderer, RenderedDocument};
pub use shipping::{FeeResolver, PostalCode, ShippingError, ShippingResolver};
