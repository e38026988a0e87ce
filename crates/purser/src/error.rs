use purser_binding::ParseError;
use thiserror::Error;

/// Errors surfaced by the engine. Configuration, validation and policy
/// errors are detected locally before any chain interaction; remote errors
/// wrap the collaborator's message. Callers should match on variants rather
/// than message text.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no contracts registered in the engine")]
    NoContractsStored,

    #[error("contract '{0}' is not registered")]
    UnknownContract(String),

    #[error("invalid contract name '{0}': names must not start with '0x'")]
    InvalidContractName(String),

    #[error("contract '{0}' declares an empty interface")]
    EmptyInterface(String),

    #[error(transparent)]
    Binding(#[from] ParseError),

    #[error("service '{service}' does not exist in contract. Services: [{}]", .available.join(", "))]
    UnknownService { service: String, available: Vec<String> },

    #[error("function '{function}' does not exist in service '{service}'. Functions: [{}]", .available.join(", "))]
    UnknownFunction {
        function: String,
        service: String,
        available: Vec<String>,
    },

    #[error("query '{method}' does not exist in service '{service}'. Queries: [{}]", .available.join(", "))]
    UnknownMethod {
        method: String,
        service: String,
        available: Vec<String>,
    },

    #[error("event '{event}' does not exist in service '{service}'. Events: [{}]", .available.join(", "))]
    UnknownEvent {
        event: String,
        service: String,
        available: Vec<String>,
    },

    #[error("no sponsor is configured to sign vouchers")]
    NoVoucherSigner,

    #[error("voucher operations require at least {minimum} token(s), {given} given")]
    TokensBelowMinimum { given: u128, minimum: u128 },

    #[error("voucher durations require at least {minimum} blocks, {given} given")]
    BlocksBelowMinimum { given: u32, minimum: u32 },

    #[error("could not derive the sponsor keypair: {0}")]
    SponsorDerivation(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("error while sending message: {0}")]
    SubmissionFailed(String),

    #[error("error while reading contract state: {0}")]
    QueryFailed(String),

    #[error("error while opening event listener: {0}")]
    SubscriptionFailed(String),

    #[error("error while signing voucher operation: {0}")]
    SigningFailed(String),
}
