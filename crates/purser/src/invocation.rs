use purser_binding::MethodKind;
use purser_ledger::{ActorId, BlockHash, ContractCall, MessageId, Signer, TxHash, VoucherId};
use serde_json::Value;
use tracing::instrument;

use crate::callback::{dispatch, Callbacks, Phase};
use crate::registry::{CallTarget, ContractBinding};
use crate::{Engine, Error};

/// Overhead applied to gas estimates when no explicit policy is given.
pub const DEFAULT_GAS_OVERHEAD_PERCENT: u64 = 10;

/// How gas is attached to a command: a fixed amount, or an estimate with a
/// percentage overhead on top. The two are mutually exclusive per invocation;
/// a fixed amount skips estimation entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasPolicy {
    Fixed(u64),
    Estimate { overhead_percent: u64 },
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::Estimate {
            overhead_percent: DEFAULT_GAS_OVERHEAD_PERCENT,
        }
    }
}

/// Options of a state-changing invocation.
pub struct CommandRequest {
    pub(crate) target: CallTarget,
    pub(crate) service: String,
    pub(crate) method: String,
    pub(crate) signer: Signer,
    pub(crate) args: Vec<Value>,
    pub(crate) value: u128,
    pub(crate) voucher: Option<VoucherId>,
    pub(crate) gas: GasPolicy,
    pub(crate) callbacks: Option<Callbacks>,
}

impl CommandRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>, signer: Signer) -> Self {
        Self {
            target: CallTarget::Default,
            service: service.into(),
            method: method.into(),
            signer,
            args: Vec::new(),
            value: 0,
            voucher: None,
            gas: GasPolicy::default(),
            callbacks: None,
        }
    }

    pub fn with_target(mut self, target: CallTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Native token amount transferred along with the call.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    /// Charge the fees of this call to `voucher` instead of the signer.
    pub fn with_voucher(mut self, voucher: VoucherId) -> Self {
        self.voucher = Some(voucher);
        self
    }

    pub fn with_gas(mut self, gas: GasPolicy) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }
}

/// Options of a read-only invocation.
pub struct QueryRequest {
    pub(crate) target: CallTarget,
    pub(crate) service: String,
    pub(crate) method: String,
    pub(crate) origin: ActorId,
    pub(crate) args: Vec<Value>,
    pub(crate) callbacks: Option<Callbacks>,
}

impl QueryRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: CallTarget::Default,
            service: service.into(),
            method: method.into(),
            origin: ActorId::ZERO,
            args: Vec::new(),
            callbacks: None,
        }
    }

    pub fn with_target(mut self, target: CallTarget) -> Self {
        self.target = target;
        self
    }

    /// Address the read is issued from. Defaults to the zero address.
    pub fn with_origin(mut self, origin: ActorId) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }
}

/// Transport metadata and decoded reply of a successful command.
#[derive(Clone, Debug)]
pub struct CommandResponse {
    pub message_id: MessageId,
    pub transaction_hash: TxHash,
    pub block_hash: BlockHash,
    pub response: Value,
}

impl Engine {
    /// Invoke a state-changing method.
    ///
    /// Target resolution and service/method validation happen before any
    /// callback fires or the chain is touched. Gas estimation is read-only,
    /// so a failure in a later binding step leaves nothing to roll back; the
    /// call is simply never submitted.
    #[instrument(name = "command", skip(self, request), fields(service = %request.service, method = %request.method))]
    pub async fn command(&self, request: CommandRequest) -> Result<CommandResponse, Error> {
        let CommandRequest {
            target,
            service,
            method,
            signer,
            args,
            value,
            voucher,
            gas,
            callbacks,
        } = request;

        let binding = self.registry.resolve(&target, self.bindings.as_ref())?;
        validate_method(&binding, &service, &method, MethodKind::Command)?;

        let callbacks = callbacks.as_ref();
        dispatch(callbacks, Phase::Load, None).await;

        let mut call = ContractCall::new(binding.address, service, method).with_args(args);

        call = match gas {
            GasPolicy::Fixed(gas_limit) => call.with_gas(gas_limit),
            GasPolicy::Estimate { overhead_percent } => match self.ledger.estimate_gas(signer.address(), &call, overhead_percent).await {
                Ok(gas_limit) => call.with_gas(gas_limit),
                Err(error) => {
                    dispatch(callbacks, Phase::Error, None).await;
                    return Err(Error::SubmissionFailed(error.to_string()));
                },
            },
        };

        if let Some(voucher) = voucher {
            call = call.with_voucher(voucher);
        }
        call = call.with_value(value);

        let dispatched = match self.ledger.send(&call, &signer).await {
            Ok(dispatched) => dispatched,
            Err(error) => {
                dispatch(callbacks, Phase::Error, None).await;
                return Err(Error::SubmissionFailed(error.to_string()));
            },
        };

        dispatch(callbacks, Phase::Block, Some(dispatched.block_hash)).await;

        let response = match self.ledger.reply(&dispatched).await {
            Ok(response) => response,
            Err(error) => {
                dispatch(callbacks, Phase::Error, None).await;
                return Err(Error::SubmissionFailed(error.to_string()));
            },
        };

        dispatch(callbacks, Phase::Success, None).await;

        Ok(CommandResponse {
            message_id: dispatched.message_id,
            transaction_hash: dispatched.transaction_hash,
            block_hash: dispatched.block_hash,
            response,
        })
    }

    /// Invoke a read-only method and return the raw decoded result.
    #[instrument(name = "query", skip(self, request), fields(service = %request.service, method = %request.method))]
    pub async fn query(&self, request: QueryRequest) -> Result<Value, Error> {
        let QueryRequest {
            target,
            service,
            method,
            origin,
            args,
            callbacks,
        } = request;

        let binding = self.registry.resolve(&target, self.bindings.as_ref())?;
        validate_method(&binding, &service, &method, MethodKind::Query)?;

        let callbacks = callbacks.as_ref();
        dispatch(callbacks, Phase::Load, None).await;

        match self.ledger.read_state(binding.address, &service, &method, origin, None, None, &args).await {
            Ok(value) => {
                dispatch(callbacks, Phase::Success, None).await;
                Ok(value)
            },
            Err(error) => {
                dispatch(callbacks, Phase::Error, None).await;
                Err(Error::QueryFailed(error.to_string()))
            },
        }
    }
}

/// Check that `service` exists in the binding and that `method` is declared
/// there with `kind`. Runs before any callback or chain interaction.
pub(crate) fn validate_method(binding: &ContractBinding, service: &str, method: &str, kind: MethodKind) -> Result<(), Error> {
    let table = binding.interface.service(service).ok_or_else(|| Error::UnknownService {
        service: service.to_string(),
        available: binding.service_names(),
    })?;

    if table.method(method) == Some(kind) {
        return Ok(());
    }

    let available = table.methods_of(kind).into_iter().map(str::to_string).collect();
    Err(match kind {
        MethodKind::Command => Error::UnknownFunction {
            function: method.to_string(),
            service: service.to_string(),
            available,
        },
        MethodKind::Query => Error::UnknownMethod {
            method: method.to_string(),
            service: service.to_string(),
            available,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use purser_ledger::mock::BASE_GAS;
    use purser_ledger::{ActorId, VoucherId};
    use serde_json::json;

    use crate::testing::TestEnvironment;
    use crate::{CallTarget, Callbacks, CommandRequest, Error, GasPolicy, QueryRequest};

    fn load_spy() -> (Callbacks, Arc<AtomicBool>) {
        let fired = Arc::new(AtomicBool::new(false));
        let spy = fired.clone();
        let callbacks = Callbacks::new().on_load(move || spy.store(true, Ordering::SeqCst));

        (callbacks, fired)
    }

    #[tokio::test]
    async fn command_resolves_with_the_decoded_reply() {
        let env = TestEnvironment::new().await;
        env.ledger.set_reply("TrafficLight", "Green", json!({ "state": "green" }));

        let signer = env.signer("user").await;
        let response = env.engine.command(CommandRequest::new("TrafficLight", "Green", signer)).await.unwrap();

        assert_eq!(response.response, json!({ "state": "green" }));
    }

    #[tokio::test]
    async fn block_callback_fires_once_before_success() {
        let env = TestEnvironment::new().await;
        let order = Arc::new(Mutex::new(Vec::new()));
        let block_order = order.clone();
        let success_order = order.clone();

        let callbacks = Callbacks::new()
            .on_block(move |block| block_order.lock().unwrap().push(format!("block:{block}")))
            .on_success(move || success_order.lock().unwrap().push("success".to_string()));

        let signer = env.signer("user").await;
        let response = env
            .engine
            .command(CommandRequest::new("TrafficLight", "Green", signer).with_callbacks(callbacks))
            .await
            .unwrap();

        let order = order.lock().unwrap();
        assert_eq!(*order, vec![format!("block:{}", response.block_hash), "success".to_string()]);
    }

    #[tokio::test]
    async fn empty_registry_rejects_before_any_callback() {
        let env = TestEnvironment::empty().await;
        let (callbacks, fired) = load_spy();

        let signer = env.signer("user").await;
        let result = env
            .engine
            .command(CommandRequest::new("TrafficLight", "Green", signer).with_callbacks(callbacks))
            .await;

        assert!(matches!(result, Err(Error::NoContractsStored)));
        assert!(!fired.load(Ordering::SeqCst));

        let (callbacks, fired) = load_spy();
        let result = env
            .engine
            .query(QueryRequest::new("TrafficLight", "TrafficLight").with_callbacks(callbacks))
            .await;

        assert!(matches!(result, Err(Error::NoContractsStored)));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_function_lists_the_available_ones() {
        let env = TestEnvironment::new().await;
        let (callbacks, fired) = load_spy();

        let signer = env.signer("user").await;
        let result = env
            .engine
            .command(CommandRequest::new("TrafficLight", "Blue", signer).with_callbacks(callbacks))
            .await;

        match result {
            Err(error @ Error::UnknownFunction { .. }) => {
                assert!(error.to_string().contains("Green, Red, Yellow"));

                let Error::UnknownFunction { function, available, .. } = error else {
                    unreachable!()
                };
                assert_eq!(function, "Blue");
                assert_eq!(available, vec!["Green", "Red", "Yellow"]);
            },
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!fired.load(Ordering::SeqCst));
        assert!(env.ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_service_lists_the_available_ones() {
        let env = TestEnvironment::new().await;

        let signer = env.signer("user").await;
        let result = env.engine.command(CommandRequest::new("StreetLight", "Green", signer)).await;

        match result {
            Err(Error::UnknownService { service, available }) => {
                assert_eq!(service, "StreetLight");
                assert_eq!(available, vec!["TrafficLight"]);
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_gas_policy_estimates_with_ten_percent_overhead() {
        let env = TestEnvironment::new().await;

        let signer = env.signer("user").await;
        env.engine.command(CommandRequest::new("TrafficLight", "Green", signer)).await.unwrap();

        assert_eq!(env.ledger.estimates(), vec![10]);
        assert_eq!(env.ledger.sent()[0].call.gas_limit, Some(BASE_GAS + BASE_GAS / 10));
    }

    #[tokio::test]
    async fn fixed_gas_skips_estimation() {
        let env = TestEnvironment::new().await;

        let signer = env.signer("user").await;
        env.engine
            .command(CommandRequest::new("TrafficLight", "Green", signer).with_gas(GasPolicy::Fixed(777)))
            .await
            .unwrap();

        assert!(env.ledger.estimates().is_empty());
        assert_eq!(env.ledger.sent()[0].call.gas_limit, Some(777));
    }

    #[tokio::test]
    async fn custom_overhead_is_forwarded_to_the_ledger() {
        let env = TestEnvironment::new().await;

        let signer = env.signer("user").await;
        env.engine
            .command(CommandRequest::new("TrafficLight", "Green", signer).with_gas(GasPolicy::Estimate { overhead_percent: 25 }))
            .await
            .unwrap();

        assert_eq!(env.ledger.estimates(), vec![25]);
    }

    #[tokio::test]
    async fn voucher_value_and_signer_are_bound_to_the_call() {
        let env = TestEnvironment::new().await;
        let voucher = VoucherId::new([3; 32]);

        let signer = env.signer("user").await;
        let origin = signer.address();
        env.engine
            .command(
                CommandRequest::new("TrafficLight", "Red", signer)
                    .with_voucher(voucher)
                    .with_value(5_000),
            )
            .await
            .unwrap();

        let sent = env.ledger.sent();
        assert_eq!(sent[0].call.voucher, Some(voucher));
        assert_eq!(sent[0].call.value, 5_000);
        assert_eq!(sent[0].signer, origin);
    }

    #[tokio::test]
    async fn submission_failure_runs_error_callbacks() {
        let env = TestEnvironment::new().await;
        env.ledger.fail_next_send("dispatch refused");

        let failed = Arc::new(AtomicBool::new(false));
        let spy = failed.clone();
        let callbacks = Callbacks::new().on_error(move || spy.store(true, Ordering::SeqCst));

        let signer = env.signer("user").await;
        let result = env
            .engine
            .command(CommandRequest::new("TrafficLight", "Green", signer).with_callbacks(callbacks))
            .await;

        match result {
            Err(Error::SubmissionFailed(message)) => assert!(message.contains("dispatch refused")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(failed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn command_works_against_an_inline_target() {
        let env = TestEnvironment::new().await;
        let address = ActorId::new([42; 32]);
        env.ledger.set_reply("Pool", "Drain", json!("drained"));

        let signer = env.signer("user").await;
        let target = CallTarget::Inline {
            address,
            interface: r#"{"Pool": {"commands": ["Drain"]}}"#.to_string(),
        };

        let response = env
            .engine
            .command(CommandRequest::new("Pool", "Drain", signer).with_target(target))
            .await
            .unwrap();

        assert_eq!(response.response, json!("drained"));
        assert_eq!(env.ledger.sent()[0].call.destination, address);
    }

    #[tokio::test]
    async fn query_defaults_to_the_zero_address() {
        let env = TestEnvironment::new().await;
        env.ledger.set_state("TrafficLight", "TrafficLight", json!("red"));

        let value = env.engine.query(QueryRequest::new("TrafficLight", "TrafficLight")).await.unwrap();

        assert_eq!(value, json!("red"));
        assert_eq!(env.ledger.reads()[0].origin, ActorId::ZERO);
    }

    #[tokio::test]
    async fn query_forwards_origin_and_args_unchanged() {
        let env = TestEnvironment::new().await;
        let origin = ActorId::new([7; 32]);

        env.engine
            .query(
                QueryRequest::new("TrafficLight", "TrafficLight")
                    .with_origin(origin)
                    .with_args(vec![json!(1), json!("two")]),
            )
            .await
            .unwrap();

        let reads = env.ledger.reads();
        assert_eq!(reads[0].origin, origin);
        assert_eq!(reads[0].args, vec![json!(1), json!("two")]);
    }

    #[tokio::test]
    async fn query_failure_runs_error_callbacks() {
        let env = TestEnvironment::new().await;
        env.ledger.fail_next_read("state unavailable");

        let failed = Arc::new(AtomicBool::new(false));
        let spy = failed.clone();
        let callbacks = Callbacks::new().on_error(move || spy.store(true, Ordering::SeqCst));

        let result = env
            .engine
            .query(QueryRequest::new("TrafficLight", "TrafficLight").with_callbacks(callbacks))
            .await;

        match result {
            Err(Error::QueryFailed(message)) => assert!(message.contains("state unavailable")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(failed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn query_rejects_a_command_method() {
        let env = TestEnvironment::new().await;
        let (callbacks, fired) = load_spy();

        let result = env
            .engine
            .query(QueryRequest::new("TrafficLight", "Green").with_callbacks(callbacks))
            .await;

        match result {
            Err(Error::UnknownMethod { method, available, .. }) => {
                assert_eq!(method, "Green");
                assert_eq!(available, vec!["TrafficLight"]);
            },
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!fired.load(Ordering::SeqCst));
    }
}
