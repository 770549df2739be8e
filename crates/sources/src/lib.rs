//! Background URL discovery sources
//!
//! A [`Poller`] wakes on a configured interval, runs its [`Discovery`]
//! operation, and submits every discovered URL through the same
//! [`Submitter`](video_digest_common::Submitter) path the HTTP facade
//! uses. The [`SourceManager`] owns the pollers, starts only the enabled
//! ones, and keeps one poller's failures from affecting its siblings.

pub mod discovery;
pub mod factory;
pub mod manager;
pub mod poller;

pub use discovery::{Discovery, SearchDiscovery, StaticListDiscovery};
pub use factory::poller_from_config;
pub use manager::SourceManager;
pub use poller::Poller;
