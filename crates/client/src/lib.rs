//! Offline-first request gateway for waypost.
//!
//! This crate provides the request interception gateway and its caching
//! strategies, offline fallbacks, the version lifecycle, the control
//! channel and push notification handling.

pub mod classify;
pub mod clients;
pub mod control;
pub mod fallback;
pub mod fetch;
pub mod gateway;
pub mod lifecycle;
pub mod message;
pub mod push;
pub mod strategy;

pub use reqwest::{Method, StatusCode};

pub use classify::{BypassReason, Classifier, Interception, Strategy};
pub use clients::{ClientId, ClientInfo, ClientRegistry};
pub use control::{ControlChannel, ControlHandle, ControlMessage, ControlReply};
pub use fallback::{ContentCategory, FallbackGenerator, FallbackTable};
pub use fetch::{HttpNetwork, Network, NetworkConfig, NetworkError};
pub use gateway::{Dispatch, Gateway};
pub use lifecycle::{Lifecycle, WorkerState};
pub use message::{FallbackKind, Request, Response, ResponseSource};
pub use push::{ClickAction, Notification, PushPayload, on_notification_click};
pub use strategy::{Resolution, StrategyContext};
