use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Install the env-filtered test subscriber. First caller wins; later calls
/// are no-ops, so every test can invoke this unconditionally.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `check` until it holds or the timeout elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Records every payload a subscription handler receives.
#[derive(Clone, Default)]
pub struct Collector {
    items: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler closure feeding this collector.
    pub fn handler(&self) -> impl Fn(&str, &[u8]) + Send + Sync + 'static {
        let items = self.items.clone();
        move |_topic, payload| {
            items.lock().unwrap().push(payload.to_vec());
        }
    }

    pub fn count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.items.lock().unwrap().clone()
    }
}
