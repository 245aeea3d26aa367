use futures::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Broadcasts the bound site id to feature modules.
///
/// Only sites the registry has validated against its list are published.
#[derive(Debug)]
pub struct SiteNotifier {
    tx: watch::Sender<Option<String>>,
}

impl Default for SiteNotifier {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }
}

impl SiteNotifier {
    pub(crate) fn publish(&self, site_id: Option<&str>) {
        self.tx.send_if_modified(|current| {
            if current.as_deref() == site_id {
                return false;
            }
            *current = site_id.map(str::to_string);
            true
        });
    }

    pub fn subscribe(&self) -> SiteChanges {
        SiteChanges {
            rx: self.tx.subscribe(),
            last: None,
        }
    }

    /// Call `callback` with the bound site now (if any) and after every
    /// change. Must be called inside a tokio runtime; dropping the returned
    /// handle unsubscribes.
    pub fn on_site_change<F>(&self, callback: F) -> SiteChangeSubscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut changes = self.subscribe();
        if let Some(site_id) = changes.try_next() {
            callback(site_id);
        }

        let handle = tokio::spawn(async move {
            while let Some(site_id) = changes.next().await {
                callback(site_id);
            }
        });
        SiteChangeSubscription { handle }
    }
}

/// Stream of bound-site changes for one subscriber.
///
/// Yields a site id only when it differs from the last one this subscriber
/// saw. Unbinding (sign-out, last site removed) is not delivered.
pub struct SiteChanges {
    rx: watch::Receiver<Option<String>>,
    last: Option<String>,
}

impl SiteChanges {
    /// The bound site if it is new to this subscriber, without waiting.
    pub fn try_next(&mut self) -> Option<String> {
        let current = self.rx.borrow_and_update().clone();
        match current {
            Some(id) if self.last.as_deref() != Some(id.as_str()) => {
                self.last = Some(id.clone());
                Some(id)
            }
            _ => None,
        }
    }

    /// Wait for the next new site. `None` once the registry is gone.
    pub async fn next(&mut self) -> Option<String> {
        loop {
            if let Some(id) = self.try_next() {
                return Some(id);
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = String> + Send {
        futures::stream::unfold(self, |mut changes| async move {
            changes.next().await.map(|id| (id, changes))
        })
    }
}

/// Keeps an `on_site_change` callback alive.
pub struct SiteChangeSubscription {
    handle: JoinHandle<()>,
}

impl Drop for SiteChangeSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
