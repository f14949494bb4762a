use crate::error::Error;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Work re-run whenever one of a registration's triggers fires.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<(), Error>>`, so
/// most callers pass an async closure.
#[async_trait]
pub trait RefreshAction: Send + Sync + 'static {
    async fn refresh(&self) -> Result<(), Error>;
}

#[async_trait]
impl<F, Fut> RefreshAction for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    async fn refresh(&self) -> Result<(), Error> {
        (self)().await
    }
}

/// Something that makes a registration refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The app returned from background to foreground.
    AppForegrounded,
    /// An event was published on this bus topic.
    Topic(String),
    /// A fixed period elapsed. The first tick is one period after
    /// registration.
    Interval(Duration),
}

impl Trigger {
    pub fn topic(topic: impl Into<String>) -> Self {
        Trigger::Topic(topic.into())
    }
}
