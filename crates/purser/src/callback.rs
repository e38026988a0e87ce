use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use purser_ledger::BlockHash;

/// Lifecycle point at which callbacks fire. `Block` only runs on the command
/// path, once the call is included in a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Load,
    Block,
    Success,
    Error,
}

type FireHook = Box<dyn Fn(Option<BlockHash>) + Send + Sync>;
type SuspendHook = Box<dyn Fn(Option<BlockHash>) -> BoxFuture<'static, ()> + Send + Sync>;

enum Hook {
    Suspend(SuspendHook),
    Fire(FireHook),
}

const SUSPEND: usize = 0;
const FIRE: usize = 1;

/// At most two handlers per phase, dispatched in slot order: the suspending
/// slot is awaited to completion before the fire-and-forget slot runs.
#[derive(Default)]
struct PhaseSlots {
    slots: [Option<Hook>; 2],
}

impl PhaseSlots {
    async fn run(&self, block: Option<BlockHash>) {
        for hook in self.slots.iter().flatten() {
            match hook {
                Hook::Suspend(hook) => hook(block).await,
                Hook::Fire(hook) => hook(block),
            }
        }
    }
}

/// Optional lifecycle handlers around invocations and voucher operations.
/// Each phase has one suspending and one fire-and-forget slot; both are
/// optional and the suspending one always runs first. Handlers receive no
/// value except the block-phase pair, which gets the block hash.
#[derive(Default)]
pub struct Callbacks {
    load: PhaseSlots,
    block: PhaseSlots,
    success: PhaseSlots,
    error: PhaseSlots,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_load(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.load.slots[FIRE] = Some(Hook::Fire(Box::new(move |_| hook())));
        self
    }

    pub fn on_load_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.load.slots[SUSPEND] = Some(Hook::Suspend(Box::new(move |_| hook().boxed())));
        self
    }

    pub fn on_block(mut self, hook: impl Fn(BlockHash) + Send + Sync + 'static) -> Self {
        self.block.slots[FIRE] = Some(Hook::Fire(Box::new(move |block| {
            if let Some(block) = block {
                hook(block)
            }
        })));
        self
    }

    pub fn on_block_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(BlockHash) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.block.slots[SUSPEND] = Some(Hook::Suspend(Box::new(move |block| match block {
            Some(block) => hook(block).boxed(),
            None => futures::future::ready(()).boxed(),
        })));
        self
    }

    pub fn on_success(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.success.slots[FIRE] = Some(Hook::Fire(Box::new(move |_| hook())));
        self
    }

    pub fn on_success_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.success.slots[SUSPEND] = Some(Hook::Suspend(Box::new(move |_| hook().boxed())));
        self
    }

    pub fn on_error(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.error.slots[FIRE] = Some(Hook::Fire(Box::new(move |_| hook())));
        self
    }

    pub fn on_error_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.error.slots[SUSPEND] = Some(Hook::Suspend(Box::new(move |_| hook().boxed())));
        self
    }

    fn phase(&self, phase: Phase) -> &PhaseSlots {
        match phase {
            Phase::Load => &self.load,
            Phase::Block => &self.block,
            Phase::Success => &self.success,
            Phase::Error => &self.error,
        }
    }
}

/// Run the handlers registered for `phase`, if any. A missing callback set is
/// a no-op. Handler panics are not caught and unwind into the caller.
pub(crate) async fn dispatch(callbacks: Option<&Callbacks>, phase: Phase, block: Option<BlockHash>) {
    if let Some(callbacks) = callbacks {
        callbacks.phase(phase).run(block).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use purser_ledger::BlockHash;

    use crate::callback::{dispatch, Callbacks, Phase};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, Arc<Mutex<Vec<&'static str>>>) {
        let order = Arc::new(Mutex::new(Vec::new()));
        (order.clone(), order)
    }

    #[tokio::test]
    async fn suspending_slot_runs_before_the_fire_slot() {
        let (order, spy) = recorder();
        let async_order = order.clone();

        let callbacks = Callbacks::new()
            .on_load(move || order.lock().unwrap().push("load"))
            .on_load_async(move || {
                let order = async_order.clone();
                async move { order.lock().unwrap().push("load_async") }
            });

        dispatch(Some(&callbacks), Phase::Load, None).await;

        assert_eq!(*spy.lock().unwrap(), vec!["load_async", "load"]);
    }

    #[tokio::test]
    async fn block_handlers_receive_the_block_hash() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sync_seen = seen.clone();
        let async_seen = seen.clone();

        let callbacks = Callbacks::new()
            .on_block(move |block| sync_seen.lock().unwrap().push(block))
            .on_block_async(move |block| {
                let seen = async_seen.clone();
                async move { seen.lock().unwrap().push(block) }
            });

        let block = BlockHash::new([5; 32]);
        dispatch(Some(&callbacks), Phase::Block, Some(block)).await;

        assert_eq!(*seen.lock().unwrap(), vec![block, block]);
    }

    #[tokio::test]
    async fn missing_callback_set_is_a_noop() {
        dispatch(None, Phase::Load, None).await;
        dispatch(None, Phase::Error, None).await;
    }

    #[tokio::test]
    async fn phases_are_independent() {
        let (order, spy) = recorder();
        let error_order = order.clone();

        let callbacks = Callbacks::new()
            .on_success(move || order.lock().unwrap().push("success"))
            .on_error(move || error_order.lock().unwrap().push("error"));

        dispatch(Some(&callbacks), Phase::Success, None).await;

        assert_eq!(*spy.lock().unwrap(), vec!["success"]);
    }
}
