//! Personal notifications: subscriptions, per-period delivery bookkeeping,
//! and direct-message dispatch.

pub mod dispatch;
pub mod ledger;
pub mod period;

pub use dispatch::{DispatchReport, NotificationDispatcher};
pub use ledger::{NotificationLedger, SchemaCategory, SubscriptionSchema, load_schema};
pub use period::NotificationPeriod;
