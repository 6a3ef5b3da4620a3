//! # Command Execution Protocol
//!
//! Every database operation runs through one generic [`Command`], parameterised
//! by a [`ResultConverter`] strategy that turns the transport's raw completion
//! into a typed result. A command is built per call, consumed by
//! [`Command::execute`], and completes exactly once with either a converted
//! result or a translated [`CommandError`].
//!
//! ## Completion modes
//!
//! - **Future** (default): `execute` returns a [`Dispatch`] future; `Command`
//!   also implements [`IntoFuture`] so it can be awaited directly.
//! - **Callback**: [`Command::with_callback`] wraps the command in a
//!   [`CallbackCommand`]. Its callback always runs on a spawned task after
//!   `execute` has returned, even if the transport completes synchronously.
//!
//! ```rust,no_run
//! # use dispatch_core::{Client, record::Key};
//! # async fn demo(client: Client) -> dispatch_core::error::CommandResult<()> {
//! let record = client.get(Key::new("test", "demo", 1), None).await?;
//! println!("generation {:?}", record.gen);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{CallSite, CommandError, CommandRef, CommandResult, DispatchError, RawError};
use crate::logging::log_command_operation;
use crate::operation::Operation;
use crate::record::Key;
use crate::status::StatusCode;
use crate::transport::{Arg, NativeCall, RawPayload, RawReply, Transport};

/// Future a command settles through.
pub type Dispatch<T> = BoxFuture<'static, CommandResult<T>>;

/// Per-execution context handed to conversion strategies.
#[derive(Debug, Clone)]
pub struct ConvertContext {
    pub command: CommandRef,
    pub call_site: Option<CallSite>,
}

impl ConvertContext {
    pub fn new(command: CommandRef, call_site: Option<CallSite>) -> Self {
        Self { command, call_site }
    }

    /// Key the command targets, if it is a single-key command.
    pub fn key(&self) -> Option<&Key> {
        self.command.key.as_ref()
    }

    pub fn operation(&self) -> Operation {
        self.command.operation
    }

    /// Translate a raw transport error; `None` on success.
    pub fn convert_error(&self, raw: Option<RawError>) -> Option<CommandError> {
        CommandError::from_raw(raw, Some(&self.command), self.call_site.as_ref())
    }

    /// Wrap a client-side failure with this command's context.
    pub fn dispatch_error(&self, error: DispatchError) -> CommandError {
        CommandError::from_dispatch(error, Some(&self.command), self.call_site.as_ref())
    }
}

/// Strategy turning a transport completion into a command result.
#[async_trait]
pub trait ResultConverter: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Hand the call to the transport. Point and batch operations use
    /// [`Transport::call`]; streaming strategies override this.
    async fn invoke(&self, transport: &dyn Transport, call: NativeCall, _ctx: &ConvertContext) -> RawReply {
        transport.call(call).await
    }

    /// Convert a successful payload.
    fn convert_result(&self, payload: RawPayload, ctx: &ConvertContext) -> CommandResult<Self::Output>;

    /// Combine the translated error and the payload into the final result.
    fn convert_response(
        &self,
        error: Option<CommandError>,
        payload: RawPayload,
        ctx: &ConvertContext,
    ) -> CommandResult<Self::Output> {
        match error {
            Some(error) => Err(error),
            None => self.convert_result(payload, ctx),
        }
    }
}

/// A single database operation ready to dispatch.
pub struct Command<C: ResultConverter> {
    client: Client,
    operation: Operation,
    args: Vec<Arg>,
    key: Option<Key>,
    requires_connection: bool,
    capture_stack_traces: bool,
    converter: C,
}

impl<C: ResultConverter> Command<C> {
    pub fn new(client: &Client, operation: Operation, args: Vec<Arg>, converter: C) -> Self {
        let key = args.iter().find_map(|arg| match arg {
            Arg::Key(key) => Some(key.clone()),
            _ => None,
        });
        Self {
            client: client.clone(),
            operation,
            args,
            key,
            requires_connection: client.config().client.require_connection,
            capture_stack_traces: client.capture_stack_traces(),
            converter,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn requires_connection(&self) -> bool {
        self.requires_connection
    }

    /// Commands complete through a future unless converted with [`Command::with_callback`].
    pub fn expects_promise(&self) -> bool {
        true
    }

    /// Complete through `callback` instead of a future.
    pub fn with_callback<F>(self, callback: F) -> CallbackCommand<C, F>
    where
        F: FnOnce(CommandResult<C::Output>) + Send + 'static,
    {
        CallbackCommand {
            command: self,
            callback,
        }
    }

    fn command_ref(&self) -> CommandRef {
        CommandRef {
            operation: self.operation,
            key: self.key.clone(),
        }
    }

    /// Dispatch the command.
    ///
    /// Fails with "Not connected." without reaching the transport when a
    /// connection is required and the client has none.
    #[track_caller]
    pub fn execute(self) -> Dispatch<C::Output> {
        let command = self.command_ref();

        if self.requires_connection && !self.client.is_connected() {
            warn!(operation = %self.operation, "Command rejected: client not connected");
            let error = CommandError::from_dispatch(DispatchError::NotConnected, Some(&command), None);
            return future::ready(Err(error)).boxed();
        }

        let call_site = if self.capture_stack_traces {
            Some(CallSite::capture())
        } else {
            None
        };

        let ctx = ConvertContext::new(command, call_site);
        let call = NativeCall::new(self.operation, self.args);
        let transport = Arc::clone(self.client.transport());
        process(transport, call, self.converter, ctx).boxed()
    }
}

impl<C: ResultConverter> IntoFuture for Command<C> {
    type Output = CommandResult<C::Output>;
    type IntoFuture = Dispatch<C::Output>;

    #[track_caller]
    fn into_future(self) -> Self::IntoFuture {
        self.execute()
    }
}

// Single funnel every command passes through.
async fn process<C: ResultConverter>(
    transport: Arc<dyn Transport>,
    call: NativeCall,
    converter: C,
    ctx: ConvertContext,
) -> CommandResult<C::Output> {
    debug!(
        operation = %call.operation,
        transport = transport.transport_name(),
        key = ?ctx.key().map(ToString::to_string),
        "Dispatching command"
    );

    let started = Instant::now();
    let RawReply { error, payload } = converter.invoke(transport.as_ref(), call, &ctx).await;
    let error = ctx.convert_error(error);
    let result = converter.convert_response(error, payload, &ctx);

    let (status, in_doubt) = match &result {
        Ok(_) => (StatusCode::OK, false),
        Err(error) => (error.code, error.in_doubt),
    };
    log_command_operation(
        ctx.operation(),
        ctx.key().map(ToString::to_string).as_deref(),
        status,
        in_doubt,
        u64::try_from(started.elapsed().as_millis()).ok(),
    );

    result
}

/// A command completing through a callback.
pub struct CallbackCommand<C: ResultConverter, F> {
    command: Command<C>,
    callback: F,
}

impl<C, F> CallbackCommand<C, F>
where
    C: ResultConverter,
    F: FnOnce(CommandResult<C::Output>) + Send + 'static,
{
    pub fn expects_promise(&self) -> bool {
        false
    }

    /// Dispatch the command. The callback runs exactly once on a spawned task,
    /// never before this call returns. Must be called within a tokio runtime.
    #[track_caller]
    pub fn execute(self) -> JoinHandle<()> {
        let operation = self.command.operation;
        let dispatch = self.command.execute();
        let callback = self.callback;
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let result = dispatch.await;
            if armed_rx.await.is_err() {
                debug!(operation = %operation, "Callback armed signal dropped");
            }
            callback(result);
        });

        // Last statement: the callback may only run once execute is done.
        let _ = armed_tx.send(());
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{IdentityConverter, ReadRecordConverter};
    use crate::config::ClientConfig;
    use crate::error::NativeError;
    use crate::record::{Bins, RecordMetadata};
    use crate::status::StatusCode;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ScriptedTransport {
        connected: AtomicBool,
        calls: AtomicUsize,
        reply: Mutex<RawReply>,
    }

    impl ScriptedTransport {
        fn new(reply: RawReply) -> Arc<Self> {
            Arc::new(Self {
                connected: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
                reply: Mutex::new(reply),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn transport_name(&self) -> &'static str {
            "scripted"
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn call(&self, _call: NativeCall) -> RawReply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.lock().clone()
        }

        async fn stream(&self, _call: NativeCall, _sink: crate::transport::StreamSink) {}
    }

    fn client(transport: &Arc<ScriptedTransport>) -> Client {
        Client::new(transport.clone(), ClientConfig::default())
    }

    fn get_command(client: &Client) -> Command<ReadRecordConverter> {
        Command::new(
            client,
            Operation::Get,
            vec![Arg::Key(Key::new("test", "demo", 1)), Arg::Policy(None)],
            ReadRecordConverter,
        )
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_completion_is_logged_with_status() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = ScriptedTransport::new(RawReply::error(NativeError::new(StatusCode::ERR_TIMEOUT, "")));
        let client = client(&transport);
        get_command(&client).await.unwrap_err();

        let output = logs.text();
        assert!(output.contains("COMMAND_OPERATION"), "{output}");
        assert!(output.contains(&format!("status={}", StatusCode::ERR_TIMEOUT)), "{output}");
        assert!(output.contains("operation=get_async"), "{output}");
    }

    #[tokio::test]
    async fn test_not_connected_never_reaches_transport() {
        let transport = ScriptedTransport::new(RawReply::ok());
        transport.connected.store(false, Ordering::SeqCst);
        let client = client(&transport);

        let err = get_command(&client).await.unwrap_err();
        assert_eq!(err.code, StatusCode::ERR_CLUSTER);
        assert_eq!(err.message, "Not connected.");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_yields_converted_result() {
        let mut bins = Bins::new();
        bins.insert("name".to_string(), json!("alice"));
        let transport = ScriptedTransport::new(RawReply::record(Some(bins), Some(RecordMetadata::new(60, 3))));
        let client = client(&transport);

        let record = get_command(&client).await.unwrap();
        assert_eq!(record.key, Key::new("test", "demo", 1));
        assert_eq!(record.gen, Some(3));
        assert_eq!(record.bin("name"), Some(&json!("alice")));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_carries_command_context() {
        let transport = ScriptedTransport::new(RawReply::error(NativeError::new(StatusCode::ERR_TIMEOUT, "")));
        let client = client(&transport);

        let err = get_command(&client).await.unwrap_err();
        assert_eq!(err.code, StatusCode::ERR_TIMEOUT);
        let command = err.command.unwrap();
        assert_eq!(command.operation, Operation::Get);
        assert_eq!(command.key, Some(Key::new("test", "demo", 1)));
        assert!(err.stack.is_none());
    }

    #[tokio::test]
    async fn test_stack_rooted_at_call_site_when_enabled() {
        let transport = ScriptedTransport::new(RawReply::error(NativeError::new(StatusCode::ERR_SERVER, "boom")));
        let client = client(&transport);
        client.set_capture_stack_traces(true);

        let err = get_command(&client).execute().await.unwrap_err();
        let stack = err.stack.unwrap();
        assert!(stack.starts_with("CommandError: boom\n"));
        assert!(stack.lines().nth(1).unwrap().contains("command.rs"));
    }

    #[tokio::test]
    async fn test_callback_runs_after_execute_returns() {
        let transport = ScriptedTransport::new(RawReply::value(json!("done")));
        let client = client(&transport);
        let returned = Arc::new(AtomicBool::new(false));
        let observed = Arc::new(Mutex::new(None));

        let command = Command::new(&client, Operation::InfoAny, vec![], IdentityConverter).with_callback({
            let returned = returned.clone();
            let observed = observed.clone();
            move |result| {
                *observed.lock() = Some((returned.load(Ordering::SeqCst), result));
            }
        });
        assert!(!command.expects_promise());

        let handle = command.execute();
        returned.store(true, Ordering::SeqCst);
        handle.await.unwrap();

        let (after_return, result) = observed.lock().take().unwrap();
        assert!(after_return);
        assert_eq!(result.unwrap(), json!("done"));
    }

    #[tokio::test]
    async fn test_callback_receives_not_connected() {
        let transport = ScriptedTransport::new(RawReply::ok());
        transport.connected.store(false, Ordering::SeqCst);
        let client = client(&transport);
        let (tx, rx) = oneshot::channel();

        get_command(&client)
            .with_callback(move |result| {
                let _ = tx.send(result);
            })
            .execute();

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.code, StatusCode::ERR_CLUSTER);
    }

    #[test]
    fn test_requires_connection_follows_config() {
        let transport = ScriptedTransport::new(RawReply::ok());
        let mut config = ClientConfig::default();
        config.client.require_connection = false;
        let client = Client::new(transport, config);

        let command = get_command(&client);
        assert!(!command.requires_connection());
        assert!(command.expects_promise());
        assert_eq!(command.key(), Some(&Key::new("test", "demo", 1)));
    }
}
