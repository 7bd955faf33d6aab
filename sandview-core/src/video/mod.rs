//! Asynchronous video synthesis and the reconciliation poller.

mod poller;

pub use poller::{
    RefreshFn, RefreshFuture, VideoPoller, VideoPollerConfig, VideoStore,
};
