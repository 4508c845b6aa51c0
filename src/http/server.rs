//! Request server.
//!
//! # Responsibilities
//! - Accept loop: every connection goes through the admission gate
//! - Scheduler loop: wait for a worker slot, then take the next connection in
//!   fairness order and spawn its handler
//! - Per connection: parse one HTTP/1.1 request with hyper, execute it,
//!   write the response, close
//! - Stop on the shutdown broadcast; pending connections are closed unserved

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;

use crate::config::ServerConfig;
use crate::http::executor::Executor;
use crate::http::request::RequestEnvelope;
use crate::http::response::ResponseEnvelope;
use crate::lifecycle::Shutdown;
use crate::net::{ClientId, Connection, CorrelationId, Listener, ListenerError};
use crate::observability::metrics;
use crate::observability::stats::ServiceStats;
use crate::scheduler::{ActiveRequestLease, FairQueue, WorkerPool};
use crate::security::{Admission, AdmissionGate, Admitted};

/// Error type for the server run loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConnectionGate = AdmissionGate<Connection>;

/// State shared by every connection task.
#[derive(Clone)]
struct ConnectionContext {
    executor: Executor,
    stats: Arc<ServiceStats>,
    max_body_bytes: usize,
}

pub struct Server {
    listener: Listener,
    gate: Arc<ConnectionGate>,
    pool: WorkerPool,
    context: ConnectionContext,
}

impl Server {
    /// Bind the listener and build the admission gate, queue and pool.
    pub async fn bind(config: &ServerConfig, executor: Executor) -> Result<Self, ServerError> {
        let listener = Listener::bind(&config.listener.bind_address).await?;
        let queue = Arc::new(FairQueue::new());
        let gate = Arc::new(AdmissionGate::new(&config.admission, queue));

        Ok(Self {
            listener,
            gate,
            pool: WorkerPool::new(config.workers.capacity),
            context: ConnectionContext {
                executor,
                stats: Arc::new(ServiceStats::new()),
                max_body_bytes: config.workers.max_body_bytes,
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub fn gate(&self) -> Arc<ConnectionGate> {
        Arc::clone(&self.gate)
    }

    pub fn pool(&self) -> WorkerPool {
        self.pool.clone()
    }

    pub fn stats(&self) -> Arc<ServiceStats> {
        Arc::clone(&self.context.stats)
    }

    /// Serve until `shutdown` fires. In-flight connections finish on their own.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = self.listener.local_addr()?;
        tracing::info!(
            address = %addr,
            workers = self.pool.capacity(),
            threshold = self.gate.threshold(),
            remote = self.context.executor.is_remote(),
            "Server starting"
        );

        let scheduler = tokio::spawn(schedule(
            Arc::clone(self.gate.queue()),
            self.pool.clone(),
            self.context.clone(),
            shutdown.clone(),
        ));

        let stop = shutdown.signalled();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(connection) => {
                        let client = connection.client();
                        if let Admission::Dropped(reason) = self.gate.admit(client, connection) {
                            tracing::debug!(client = %client, reason = ?reason, "Connection dropped");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = &mut stop => break,
            }
        }

        if let Err(e) = scheduler.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }

        let unserved = self.gate.queue().drain();
        tracing::info!(unserved = unserved.len(), "Server stopped");
        Ok(())
    }
}

/// Hand admitted connections to worker slots in fairness order.
async fn schedule(
    queue: Arc<FairQueue<Admitted<Connection>>>,
    pool: WorkerPool,
    context: ConnectionContext,
    shutdown: Shutdown,
) {
    let stop = shutdown.signalled();
    tokio::pin!(stop);

    loop {
        let slot = tokio::select! {
            slot = pool.acquire() => match slot {
                Ok(slot) => slot,
                Err(_) => break,
            },
            _ = &mut stop => break,
        };

        let next = tokio::select! {
            next = queue.dequeue() => next,
            _ = &mut stop => break,
        };

        let Admitted { ticket, item: connection } = next.item;
        let lease = slot.lease(ticket, connection.correlation_id);
        tracing::trace!(
            client = %next.client,
            seq = next.seq,
            correlation_id = %connection.correlation_id,
            "Connection scheduled"
        );
        tokio::spawn(serve_connection(connection, lease, context.clone()));
    }

    tracing::debug!("Scheduler stopped");
}

async fn serve_connection(connection: Connection, lease: ActiveRequestLease, context: ConnectionContext) {
    let client = connection.client();
    let correlation_id = connection.correlation_id;
    let connection_id = connection.id;
    let io = TokioIo::new(connection.stream);

    let service = service_fn(move |request: Request<Incoming>| {
        let context = context.clone();
        async move {
            Ok::<_, Infallible>(handle_request(request, client, correlation_id, context).await)
        }
    });

    if let Err(e) = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(io, service)
        .await
    {
        tracing::debug!(
            connection_id = %connection_id,
            correlation_id = %correlation_id,
            error = %e,
            "Connection abandoned"
        );
    }

    drop(lease);
}

async fn handle_request(
    request: Request<Incoming>,
    client: ClientId,
    correlation_id: CorrelationId,
    context: ConnectionContext,
) -> Response<Body> {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(Body::new(body), context.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(correlation_id = %correlation_id, error = %e, "Unreadable request body");
            let response =
                ResponseEnvelope::error(correlation_id, StatusCode::BAD_REQUEST, "unreadable request body");
            context.stats.record(response.status, response.service_time());
            metrics::record_request(response.status, response.service_time());
            return response.into_response();
        }
    };

    let envelope = RequestEnvelope::new(correlation_id, client, &parts, body);
    let response = context.executor.execute(envelope).await;

    context.stats.record(response.status, response.service_time());
    metrics::record_request(response.status, response.service_time());
    tracing::debug!(
        correlation_id = %correlation_id,
        client = %client,
        status = response.status,
        service_time_us = response.service_time_us,
        "Request served"
    );

    response.into_response()
}
