//! Command handlers and the middleware layers wrapped around them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use teloxide::RequestError;
use teloxide::prelude::*;
use tracing::{Instrument, debug, info_span, warn};

use super::Context;
use crate::bot::errors;

pub type HandlerResult = anyhow::Result<()>;
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

type HandlerFn = dyn Fn(Context) -> HandlerFuture + Send + Sync;

/// Sent when a retried command keeps failing on network errors.
const RETRY_EXHAUSTED: &str = "Telegram is having trouble right now, please try again later.";

/// A callable command target.
///
/// Clones share the same function, which is how aliases are recognised as
/// pointing at the same target.
#[derive(Clone)]
pub struct Handler {
    name: Option<&'static str>,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// A handler with a function name, used for default titles and command names.
    pub fn named<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: Some(name),
            func: Arc::new(move |ctx| f(ctx).boxed()),
        }
    }

    /// A handler without a name. Needs an explicit command name unless it
    /// only answers callback queries.
    pub fn anonymous<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: None,
            func: Arc::new(move |ctx| f(ctx).boxed()),
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn call(&self, ctx: Context) -> HandlerFuture {
        (self.func)(ctx)
    }

    /// Whether both handlers invoke the very same function.
    pub fn same_target(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    fn wrap<F, Fut>(self, f: F) -> Handler
    where
        F: Fn(Handler, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let name = self.name;
        let inner = self;
        Handler {
            name,
            func: Arc::new(move |ctx| f(inner.clone(), ctx).boxed()),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name.unwrap_or("<anonymous>"))
            .finish()
    }
}

/// Bind a module method as a named handler.
///
/// `handler!(self, ban)` calls `self.ban(ctx)` on a clone of the `Arc`
/// and names the handler `ban`. Method resolution on the `Arc` prefers
/// `CommandModule` methods, so handler methods must not be called
/// `commands`, `group`, `button_prefix` or `button_actions`.
macro_rules! handler {
    ($this:expr, $method:ident) => {{
        let this = ::std::sync::Arc::clone(&$this);
        $crate::registry::Handler::named(stringify!($method), move |ctx| {
            let this = ::std::sync::Arc::clone(&this);
            async move { this.$method(ctx).await }
        })
    }};
}

pub(crate) use handler;

/// Retry settings for commands that talk to flaky services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Multiplied by the attempt number before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Optional middleware around a command target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Run detached from the update loop. Errors are still reported.
    Spawn,
    /// Retry on transient network failures.
    Retry(RetryPolicy),
}

impl Layer {
    // Lower ranks sit closer to the target.
    fn rank(&self) -> u8 {
        match self {
            Layer::Retry(_) => 0,
            Layer::Spawn => 1,
        }
    }
}

/// Build the invokable handler of a command.
///
/// Order, outermost first: context capture, spawn, retry, target. The
/// order does not depend on the order layers were declared in.
pub fn compose(target: &Handler, command_name: &str, layers: &[Layer]) -> Handler {
    let mut ordered = layers.to_vec();
    ordered.sort_by_key(Layer::rank);
    ordered.dedup_by_key(|layer| layer.rank());

    let mut handler = target.clone();
    for layer in ordered {
        handler = match layer {
            Layer::Retry(policy) => retry(handler, policy),
            Layer::Spawn => spawn(handler),
        };
    }

    capture_context(handler, command_name)
}

fn capture_context(inner: Handler, command_name: &str) -> Handler {
    let command: Arc<str> = command_name.into();
    inner.wrap(move |inner, ctx| {
        let span = info_span!(
            "command",
            command = %command,
            chat_id = ctx.chat_id.0,
            user_id = ctx.user().map(|u| u.id.0),
        );
        async move {
            debug!("dispatching");
            inner.call(ctx).await
        }
        .instrument(span)
    })
}

fn spawn(inner: Handler) -> Handler {
    inner.wrap(|inner, ctx| async move {
        tokio::spawn(
            async move {
                let bot = ctx.bot.clone();
                let chat_id = ctx.chat_id;
                if let Err(err) = inner.call(ctx).await {
                    errors::report(&bot, Some(chat_id), &err).await;
                }
            }
            .in_current_span(),
        );
        Ok(())
    })
}

fn retry(inner: Handler, policy: RetryPolicy) -> Handler {
    inner.wrap(move |inner, ctx| async move {
        let bot = ctx.bot.clone();
        let chat_id = ctx.chat_id;

        match with_retries(policy, || inner.call(ctx.clone())).await {
            Ok(()) => Ok(()),
            Err(Failure::Exhausted(err)) => {
                warn!("Giving up after {} attempts: {:#}", policy.attempts, err);
                // Nobody to tell: surface the original failure instead.
                if bot.send_message(chat_id, RETRY_EXHAUSTED).await.is_err() {
                    return Err(err);
                }
                Ok(())
            }
            Err(Failure::Fatal(err)) => Err(err),
        }
    })
}

/// Why a retried operation ended in an error.
#[derive(Debug)]
pub(crate) enum Failure {
    /// Every attempt failed transiently.
    Exhausted(anyhow::Error),
    /// A non-transient error, returned as soon as it happened.
    Fatal(anyhow::Error),
}

pub(crate) async fn with_retries<F, Fut>(policy: RetryPolicy, mut op: F) -> Result<(), Failure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HandlerResult>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(err) if !is_transient(&err) => return Err(Failure::Fatal(err)),
            Err(err) if attempt >= policy.attempts => return Err(Failure::Exhausted(err)),
            Err(err) => {
                debug!("Attempt {} failed transiently: {:#}", attempt, err);
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
        }
    }
}

/// Network-level failures worth another attempt.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<RequestError>() {
            return matches!(e, RequestError::Network(_) | RequestError::RetryAfter(_));
        }
        if let Some(e) = cause.downcast_ref::<reqwest::Error>() {
            return e.is_timeout() || e.is_connect();
        }
        if let Some(e) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            );
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::ZERO,
        }
    }

    fn timeout() -> anyhow::Error {
        anyhow::Error::new(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
    }

    #[test]
    fn test_same_target() {
        let a = Handler::named("start", |_| async { Ok(()) });
        let b = a.clone();
        let c = Handler::named("start", |_| async { Ok(()) });

        assert!(a.same_target(&b));
        assert!(!a.same_target(&c));
        assert_eq!(a.name(), Some("start"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&timeout()));
        assert!(is_transient(&timeout().context("while downloading")));
        assert!(!is_transient(&anyhow::anyhow!("bad input")));
        assert!(!is_transient(&anyhow::Error::new(io::Error::new(
            io::ErrorKind::NotFound,
            "missing"
        ))));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(quick(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(timeout()) } else { Ok(()) } }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let calls = AtomicU32::new(0);
        let result = with_retries(quick(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout()) }
        })
        .await;

        assert!(matches!(result, Err(Failure::Exhausted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retries(quick(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("division by zero")) }
        })
        .await;

        assert!(matches!(result, Err(Failure::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_layer_rank() {
        assert!(Layer::Retry(RetryPolicy::default()).rank() < Layer::Spawn.rank());
    }
}
