//! Attaching typed response handlers to a [`DataRequest`].
//!
//! Each `response*` method builds a serializer, registers it on the request and
//! returns the request again, so several handlers can be chained on one request.
//! The request is executed once; every handler serializes the same outcome and
//! receives exactly one [`DataResponse`].
//!
//! Where the callback runs is chosen per handler with an [`ExecutionContext`]:
//!
//! - [`Inline`](ExecutionContext::Inline) - on the task that ran the serializer
//! - [`Runtime`](ExecutionContext::Runtime) - on a task of the given tokio runtime
//! - [`Queue`](ExecutionContext::Queue) - on a caller-drained serial [`DispatchQueue`],
//!   for code that must observe results on one particular thread
//!
//! # Examples
//!
//! ```rust,no_run
//! use respmap::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Forecast {
//!     day: Option<String>,
//! }
//!
//! impl Mappable for Forecast {
//!     fn mapping(&mut self, map: &Map<'_>) {
//!         map.bind(&mut self.day, "day");
//!     }
//! }
//!
//! # async fn example() {
//! let (main_queue, mut runner) = DispatchQueue::new("main");
//! let options = ResponseOptionsBuilder::default()
//!     .key_path("three_day_forecast")
//!     .queue(main_queue)
//!     .build()
//!     .unwrap();
//!
//! let request = HttpClient::new().get("https://api.example.com/weather");
//! request.response_array::<Forecast, _>(options, |response| {
//!     for forecast in response.result.unwrap_or_default() {
//!         println!("{:?}", forecast.day);
//!     }
//! });
//!
//! request.finish().await;
//! runner.run_pending();
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::{
    formatter::FormatterConfig,
    mapper::{ImmutableMappable, Mappable},
    net::DataRequest,
    serializer::{self, ResponseSerializer},
    types::{DataResponse, ResponseOptions},
};

type Job = Box<dyn FnOnce() + Send>;

/// Where a completion callback runs.
#[derive(Debug, Clone, Default)]
pub enum ExecutionContext {
    /// Run on the task that serialized the response.
    #[default]
    Inline,

    /// Run on a new task of the given runtime.
    Runtime(Handle),

    /// Enqueue on a serial queue drained by its [`QueueRunner`].
    ///
    /// If the runner has been dropped the callback is discarded with a warning and
    /// never runs.
    Queue(DispatchQueue),
}

impl ExecutionContext {
    /// Runs `job` in this context.
    ///
    /// Completes once the job has run, except for [`Queue`](ExecutionContext::Queue),
    /// where it completes once the job is enqueued.
    pub(crate) async fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            ExecutionContext::Inline => job(),
            ExecutionContext::Runtime(handle) => {
                if let Err(e) = handle.spawn(async move { job() }).await {
                    tracing::warn!(error = %e, "completion callback did not complete");
                }
            }
            ExecutionContext::Queue(queue) => {
                queue.submit(job);
            }
        }
    }
}

impl From<Handle> for ExecutionContext {
    fn from(handle: Handle) -> Self {
        ExecutionContext::Runtime(handle)
    }
}

impl From<DispatchQueue> for ExecutionContext {
    fn from(queue: DispatchQueue) -> Self {
        ExecutionContext::Queue(queue)
    }
}

/// Sending half of a serial callback queue.
///
/// Cloning yields another handle to the same queue. Jobs run in submission order,
/// one at a time, wherever the matching [`QueueRunner`] is driven.
#[derive(Clone)]
pub struct DispatchQueue {
    label: Arc<str>,
    sender: mpsc::UnboundedSender<Job>,
}

impl DispatchQueue {
    /// Creates a queue and the runner that drains it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use respmap::response::DispatchQueue;
    ///
    /// let (queue, mut runner) = DispatchQueue::new("main");
    /// queue.submit(|| println!("first"));
    /// queue.submit(|| println!("second"));
    /// assert_eq!(runner.run_pending(), 2);
    /// ```
    pub fn new(label: impl Into<String>) -> (Self, QueueRunner) {
        let label: Arc<str> = label.into().into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            label: label.clone(),
            sender,
        };
        (queue, QueueRunner { label, receiver })
    }

    /// Name given at creation, for diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueues `job`. Returns `false` if the runner is gone and the job was dropped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender.send(Box::new(job)) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(queue = %self.label, "dispatch queue closed, callback dropped");
                false
            }
        }
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("label", &self.label)
            .finish()
    }
}

/// Receiving half of a [`DispatchQueue`]; runs the queued jobs.
pub struct QueueRunner {
    label: Arc<str>,
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl QueueRunner {
    /// Name of the queue this runner drains.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs jobs as they arrive until every [`DispatchQueue`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            job();
        }
        tracing::trace!(queue = %self.label, "dispatch queue drained");
    }

    /// Runs every job already enqueued, without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Waits for the next job and runs it. Returns `false` once the queue is closed
    /// and empty.
    pub async fn run_next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl DataRequest {
    /// Attaches a handler that runs `serializer` on the outcome and passes the result
    /// to `completion` in `queue`.
    ///
    /// This is the generic form behind the typed `response_*` methods; use it with a
    /// custom [`ResponseSerializer`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn response<S, F>(&self, serializer: S, queue: ExecutionContext, completion: F) -> &Self
    where
        S: ResponseSerializer,
        F: FnOnce(DataResponse<S::Output>) + Send + 'static,
    {
        let request = self.clone();
        let handle = tokio::spawn(async move {
            let response = request.serialize(serializer).await;
            queue.dispatch(move || completion(response)).await;
        });
        self.push_handler(handle);
        self
    }

    /// Waits for the outcome and serializes it, without attaching a handler.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use respmap::prelude::*;
    /// use respmap::serializer;
    ///
    /// # async fn example() -> respmap::Result<()> {
    /// let request = HttpClient::new().delete("https://api.example.com/items/1");
    /// let response = request
    ///     .serialize(serializer::object::<Empty>(&ResponseOptions::default()))
    ///     .await;
    /// response.into_result()?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn serialize<S: ResponseSerializer>(&self, serializer: S) -> DataResponse<S::Output> {
        let raw = self.outcome().await;
        let result = serializer.serialize(
            Some(self.info()),
            raw.response.as_ref(),
            raw.data.as_deref(),
            raw.error.clone(),
        );

        DataResponse {
            request: self.info().clone(),
            response: raw.response.clone(),
            data: raw.data.clone(),
            result,
        }
    }

    /// Maps the response onto a new `T`.
    ///
    /// # Parameters
    ///
    /// * `options` - Key path, context, queue and empty-body rules; a `&str` is taken
    ///   as the key path
    /// * `completion` - Receives the mapped object or the error
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn response_object<T, F>(&self, options: impl Into<ResponseOptions>, completion: F) -> &Self
    where
        T: Mappable + Send + 'static,
        F: FnOnce(DataResponse<T>) + Send + 'static,
    {
        let options = options.into();
        self.response(serializer::object::<T>(&options), options.queue, completion)
    }

    /// Maps the response onto an existing instance, which is handed back populated.
    ///
    /// Fields without a usable JSON value keep what they held; a missing key path
    /// leaves the instance untouched and still succeeds.
    pub fn response_object_onto<T, F>(
        &self,
        object: T,
        options: impl Into<ResponseOptions>,
        completion: F,
    ) -> &Self
    where
        T: Mappable + Send + 'static,
        F: FnOnce(DataResponse<T>) + Send + 'static,
    {
        let options = options.into();
        self.response(serializer::onto(object, &options), options.queue, completion)
    }

    /// Constructs an [`ImmutableMappable`] `T` from the response.
    ///
    /// A missing or mistyped required field fails with a mapping error whose cause
    /// names the field path.
    pub fn response_immutable_object<T, F>(
        &self,
        options: impl Into<ResponseOptions>,
        completion: F,
    ) -> &Self
    where
        T: ImmutableMappable + Send + 'static,
        F: FnOnce(DataResponse<T>) + Send + 'static,
    {
        let options = options.into();
        self.response(serializer::immutable::<T>(&options), options.queue, completion)
    }

    /// Maps a JSON array onto a `Vec<T>`; every element must map.
    pub fn response_array<T, F>(&self, options: impl Into<ResponseOptions>, completion: F) -> &Self
    where
        T: Mappable + Send + 'static,
        F: FnOnce(DataResponse<Vec<T>>) + Send + 'static,
    {
        let options = options.into();
        self.response(serializer::array::<T>(&options), options.queue, completion)
    }

    /// Constructs a `Vec<T>` of [`ImmutableMappable`] values from a JSON array.
    pub fn response_immutable_array<T, F>(
        &self,
        options: impl Into<ResponseOptions>,
        completion: F,
    ) -> &Self
    where
        T: ImmutableMappable + Send + 'static,
        F: FnOnce(DataResponse<Vec<T>>) + Send + 'static,
    {
        let options = options.into();
        self.response(
            serializer::immutable_array::<T>(&options),
            options.queue,
            completion,
        )
    }

    /// Renders the response JSON as [`Mappable`] struct source named `class_name`.
    ///
    /// Useful for bootstrapping models from a live endpoint; see
    /// [`ClassFormatter`](crate::formatter::ClassFormatter).
    pub fn response_class_stub<F>(
        &self,
        options: impl Into<ResponseOptions>,
        class_name: &str,
        include_substructures: bool,
        config: FormatterConfig,
        completion: F,
    ) -> &Self
    where
        F: FnOnce(DataResponse<String>) + Send + 'static,
    {
        let options = options.into();
        let stub = serializer::class_stub(&options, class_name, include_substructures, config);
        self.response(stub, options.queue, completion)
    }
}
