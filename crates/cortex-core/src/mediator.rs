//! Request/handler dispatch.
//!
//! Every request type is routed to exactly one handler. Handlers are
//! registered explicitly at startup against a `shaku` module, which acts as
//! the dependency resolver: each `send` asks the module to build a fresh
//! handler with its dependencies injected, then awaits it once.
//!
//! ```ignore
//! let mediator = Mediator::builder()
//!     .register::<CreateSystemInstruction, CreateSystemInstructionHandler>()?
//!     .register::<GenerateContent, GenerateContentHandler>()?
//!     .initialize(module);
//!
//! let id = mediator.send(command).await?;
//! ```

use crate::{BoxFuture, MediatorError, ResultFuture};
use async_trait::async_trait;
use shaku::{Module, Provider};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A message routed through the [`Mediator`].
///
/// The error type must absorb [`MediatorError`] so that routing failures
/// reach the caller through the same channel as handler failures.
pub trait Request: Send + 'static {
    /// Success value.
    type Response: Send + 'static;
    /// Failure value.
    type Error: From<MediatorError> + Send + 'static;
}

/// Handles one request type.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    /// Handles the request.
    async fn handle(&self, request: R) -> Result<R::Response, R::Error>;
}

type Handle<M, R> = Arc<
    dyn Fn(Arc<M>, R) -> BoxFuture<'static, Result<<R as Request>::Response, <R as Request>::Error>>
        + Send
        + Sync,
>;

struct Registration {
    handler_type: &'static str,
    /// Holds a `Handle<M, R>` for the request type keyed in the map.
    handle: Box<dyn Any + Send + Sync>,
}

/// Collects request → handler registrations before the resolver exists.
pub struct MediatorBuilder<M: Module> {
    handlers: HashMap<TypeId, Registration>,
    _module: std::marker::PhantomData<fn() -> M>,
}

impl<M: Module> MediatorBuilder<M> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            _module: std::marker::PhantomData,
        }
    }

    /// Routes request type `R` to handler `H`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::DuplicateHandler`] when `R` already has a
    /// handler; ambiguous routing is rejected at startup.
    pub fn register<R, H>(mut self) -> Result<Self, MediatorError>
    where
        R: Request,
        H: Provider<M, Interface = dyn RequestHandler<R>>,
    {
        let request_type = type_name::<R>();
        let handler_type = type_name::<H>();

        if let Some(existing) = self.handlers.get(&TypeId::of::<R>()) {
            error!(
                request_type,
                existing = existing.handler_type,
                rejected = handler_type,
                "Duplicate handler registration"
            );
            return Err(MediatorError::DuplicateHandler { request_type });
        }

        let handle: Handle<M, R> = Arc::new(move |module: Arc<M>, request: R| {
            Box::pin(async move {
                let handler = H::provide(&*module).map_err(|e| e.to_string());
                match handler {
                    Ok(handler) => handler.handle(request).await,
                    Err(message) => {
                        error!(request_type, handler_type, %message, "Failed to resolve handler");
                        Err(MediatorError::Resolution {
                            request_type,
                            handler: handler_type,
                            message,
                        }
                        .into())
                    }
                }
            })
        });

        debug!(request_type, handler_type, "Registered request handler");
        self.handlers.insert(
            TypeId::of::<R>(),
            Registration {
                handler_type,
                handle: Box::new(handle),
            },
        );
        Ok(self)
    }

    /// Binds the registrations to their resolver.
    ///
    /// Consumes the builder, so a mediator is initialised exactly once and
    /// its routing table is read-only from here on.
    pub fn initialize(self, module: Arc<M>) -> Mediator<M> {
        info!(handlers = self.handlers.len(), "Mediator initialized");
        Mediator {
            inner: Arc::new(MediatorInner {
                module,
                handlers: self.handlers,
            }),
        }
    }
}

impl<M: Module> Default for MediatorBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

struct MediatorInner<M> {
    module: Arc<M>,
    handlers: HashMap<TypeId, Registration>,
}

/// Routes requests to their registered handlers.
///
/// Cloning is cheap; clones share the routing table and resolver.
pub struct Mediator<M: Module> {
    inner: Arc<MediatorInner<M>>,
}

impl<M: Module> Clone for Mediator<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Module> Mediator<M> {
    /// Starts a new registration table.
    #[must_use]
    pub fn builder() -> MediatorBuilder<M> {
        MediatorBuilder::new()
    }

    /// Sends a request to its handler.
    ///
    /// The returned wrapper is lazy: the handler is resolved and invoked when
    /// it is awaited. A request type without a handler resolves to
    /// [`MediatorError::HandlerNotFound`] converted into `R::Error`.
    pub fn send<R: Request>(&self, request: R) -> ResultFuture<'static, R::Response, R::Error> {
        let request_type = type_name::<R>();
        let handle = self
            .inner
            .handlers
            .get(&TypeId::of::<R>())
            .and_then(|registration| registration.handle.downcast_ref::<Handle<M, R>>());

        match handle {
            Some(handle) => {
                debug!(request_type, "Dispatching request");
                ResultFuture::new(handle(Arc::clone(&self.inner.module), request))
            }
            None => {
                error!(request_type, "Handler not found");
                ResultFuture::ready(Err(MediatorError::HandlerNotFound { request_type }.into()))
            }
        }
    }

    /// Checks whether `R` has a handler.
    #[must_use]
    pub fn is_registered<R: Request>(&self) -> bool {
        self.inner.handlers.contains_key(&TypeId::of::<R>())
    }

    /// Returns the number of registered request types.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.len()
    }

    /// Returns the dependency resolver.
    #[must_use]
    pub fn module(&self) -> &Arc<M> {
        &self.inner.module
    }
}
