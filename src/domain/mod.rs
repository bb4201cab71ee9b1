//! Domain layer: pure pricing and order lifecycle logic, no I/O.

pub mod clock;
pub mod events;
pub mod format;
pub mod number;
pub mod order;
pub mod pricing;

pub use clock::{Clock, SystemClock};
pub use events::OrderEvent;
pub use number::{CounterSuffix, OrderNumber, SuffixSource};
pub use order::{
    Address, LineItem, Order, OrderError, OrderSnapshot, OrderStatus, OrderSummary, PaymentInfo,
    PaymentMethod, PaymentStatus, StatusEntry,
};
pub use pricing::{PriceBreakdown, PricingContext};
