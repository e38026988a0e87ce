use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use purser_ledger::ActorId;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

use crate::registry::CallTarget;
use crate::{Engine, Error};

type EventHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Options for opening a long-lived event listener. The handler may suspend;
/// emissions are awaited one at a time per listener.
pub struct SubscribeRequest {
    pub(crate) target: CallTarget,
    pub(crate) service: String,
    pub(crate) event: String,
    pub(crate) handler: EventHandler,
}

impl SubscribeRequest {
    pub fn new<F, Fut>(service: impl Into<String>, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            target: CallTarget::Default,
            service: service.into(),
            event: event.into(),
            handler: Arc::new(move |payload| handler(payload).boxed()),
        }
    }

    pub fn with_target(mut self, target: CallTarget) -> Self {
        self.target = target;
        self
    }
}

pub(crate) struct Listener {
    task: JoinHandle<()>,
}

pub(crate) type ListenerStore = Arc<Mutex<HashMap<Uuid, Listener>>>;

/// Handle of an open listener. Dropping it keeps the listener alive;
/// [`Subscription::unsubscribe`] closes the underlying stream task and
/// removes the registry entry.
pub struct Subscription {
    id: Uuid,
    /// Address of the contract the listener is bound to.
    pub address: ActorId,
    pub service: String,
    pub event: String,

    listeners: ListenerStore,
}

impl Subscription {
    /// Close this listener and drop it from the registry.
    pub async fn unsubscribe(self) {
        let listener = self.listeners.lock().await.remove(&self.id);
        if let Some(listener) = listener {
            listener.task.abort();
            let _ = listener.task.await;
        }
    }
}

impl Engine {
    /// Open a listener on `event` emitted by `service` of the resolved
    /// contract. Validation follows the same fail-fast contract as
    /// invocations: no listener is opened for an unknown service or event.
    #[instrument(name = "subscribe", skip(self, request), fields(service = %request.service, event = %request.event))]
    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription, Error> {
        let SubscribeRequest {
            target,
            service,
            event,
            handler,
        } = request;

        let binding = self.registry.resolve(&target, self.bindings.as_ref())?;
        let table = binding.interface.service(&service).ok_or_else(|| Error::UnknownService {
            service: service.clone(),
            available: binding.service_names(),
        })?;
        if !table.has_event(&event) {
            return Err(Error::UnknownEvent {
                event: event.clone(),
                service: service.clone(),
                available: table.events().to_vec(),
            });
        }

        let mut stream = self
            .ledger
            .subscribe_events(binding.address, &service, &event)
            .await
            .map_err(|error| Error::SubscriptionFailed(error.to_string()))?;

        let task = tokio::spawn(async move {
            while let Some(payload) = stream.next().await {
                handler(payload).await;
            }
        });

        let id = Uuid::new_v4();
        self.listeners.lock().await.insert(id, Listener { task });

        Ok(Subscription {
            id,
            address: binding.address,
            service,
            event,
            listeners: self.listeners.clone(),
        })
    }

    /// Close every open listener and clear the registry.
    pub async fn unsubscribe_all(&self) {
        let drained: Vec<Listener> = self.listeners.lock().await.drain().map(|(_, listener)| listener).collect();

        for listener in drained {
            listener.task.abort();
            let _ = listener.task.await;
        }
    }

    /// Number of listeners currently open.
    pub async fn listener_count(&self) -> usize {
        self.listeners.lock().await.len()
    }
}
