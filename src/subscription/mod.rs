// Broker topic subscriptions

pub mod registry;

pub use registry::SubscriptionRegistry;
