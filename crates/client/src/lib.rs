//! Client code for shellcache.
//!
//! This crate provides the network client and the offline cache router
//! shared by the server binary.

pub mod fetch;
pub mod router;

pub use fetch::{FetchClient, FetchConfig};

pub use router::{
    ClientRegistry, DeferredTaskScheduler, FetchOutcome, HostCapabilities, LifecycleState, Network, Notification,
    NotificationDisplay, OfflineRouter, ResponseSource, RoutedResponse, RouterConfig, Strategy, WindowClient,
};
