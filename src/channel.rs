use crate::{
    convert::time_to_string,
    endpoint::{track_endpoint, DEFAULT_BREEZE_ENDPOINT},
    models::{
        context_tag_keys::{
            Tags, APPLICATION_VERSION, CLOUD_ROLE, CLOUD_ROLE_INSTANCE, INTERNAL_SDK_VERSION,
        },
        Envelope, Sanitize,
    },
    uploader, Error, Telemetry, Transport,
};
use backon::ExponentialBuilder;
use http::Uri;
use opentelemetry_http::HttpClient;
use std::{
    fmt::Debug,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError, TrySendError},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant, SystemTime},
};

const DEFAULT_MAX_BATCH_SIZE: usize = 500;
const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;
const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(30);
const MIN_SEND_INTERVAL: Duration = Duration::from_millis(1);

enum Message {
    Track(Envelope),
    Flush(mpsc::SyncSender<()>),
    Shutdown,
}

/// Builder for a [`Channel`].
#[derive(Debug)]
pub struct ChannelBuilder<C> {
    instrumentation_key: String,
    client: C,
    endpoint: Uri,
    max_batch_size: usize,
    max_queue_size: usize,
    send_interval: Duration,
    sample_rate: f64,
    tags: Tags,
    backoff: ExponentialBuilder,
}

impl<C: HttpClient + 'static> ChannelBuilder<C> {
    /// Send telemetry to a different ingestion endpoint.
    ///
    /// The URL is trimmed, upgraded to `https` and `/v2/track` is appended.
    ///
    /// Default: `https://dc.services.visualstudio.com`
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, Error> {
        self.endpoint = track_endpoint(endpoint)?;
        Ok(self)
    }

    /// Upload as soon as this many items are buffered.
    ///
    /// Default: 500
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Number of items that may wait for the background worker. Items tracked while the queue
    /// is full, for example during a slow upload, are dropped.
    ///
    /// Default: 2048
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size.max(1);
        self
    }

    /// Upload buffered items at least this often. Intervals too large to schedule disable the
    /// timer, so items are only uploaded when a batch is full, on flush and on drop.
    ///
    /// Default: 30 seconds, minimum: 1 millisecond
    pub fn with_send_interval(mut self, send_interval: Duration) -> Self {
        self.send_interval = send_interval.max(MIN_SEND_INTERVAL);
        self
    }

    /// Set sample rate, which is passed through to Application Insights. It should be a value
    /// between 0 and 1 and match the rate used to decide which items are tracked.
    ///
    /// Default: 1.0
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        // Application Insights expects the sample rate as a percentage.
        self.sample_rate = sample_rate * 100.0;
        self
    }

    /// Retry a failed upload at most this many times.
    ///
    /// Default: 3
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.backoff = self.backoff.with_max_times(max_retries);
        self
    }

    /// Wait at least this long before the first retry. Later retries back off exponentially.
    ///
    /// Default: 500 milliseconds
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.backoff = self.backoff.with_min_delay(delay);
        self
    }

    /// Add an application version to all telemetry items.
    pub fn with_application_version(mut self, version: impl Into<String>) -> Self {
        self.tags.insert(APPLICATION_VERSION, version.into());
        self
    }

    /// Name of the role the application is a part of.
    pub fn with_cloud_role(mut self, role: impl Into<String>) -> Self {
        self.tags.insert(CLOUD_ROLE, role.into());
        self
    }

    /// Name of the instance the application is running on.
    pub fn with_cloud_role_instance(mut self, instance: impl Into<String>) -> Self {
        self.tags.insert(CLOUD_ROLE_INSTANCE, instance.into());
        self
    }

    /// Start the background worker and return the channel.
    pub fn build(self) -> Result<Channel<C>, Error> {
        let endpoint = Arc::new(self.endpoint);
        let (sender, receiver) = mpsc::sync_channel(self.max_queue_size);

        let worker = Worker {
            client: self.client,
            endpoint: Arc::clone(&endpoint),
            max_batch_size: self.max_batch_size,
            send_interval: self.send_interval,
            backoff: self.backoff,
            buffer: Vec::new(),
        };
        let handle = std::thread::Builder::new()
            .name("application-insights-channel".into())
            .spawn(move || worker.run(receiver))
            .map_err(Error::ChannelStart)?;

        Ok(Channel {
            endpoint,
            instrumentation_key: self.instrumentation_key,
            sample_rate: self.sample_rate,
            tags: self.tags,
            sender,
            stopped: AtomicBool::new(false),
            worker: Some(handle),
            _client: std::marker::PhantomData,
        })
    }
}

/// Buffers telemetry and uploads it to Application Insights in batches.
///
/// Items are serialized on the calling thread and handed to a background thread, which uploads
/// when the batch is full, when the send interval elapses, on [`flush`](Transport::flush) and when
/// the channel is dropped. Transient upload failures are retried with exponential backoff. Items
/// that still fail are logged and dropped, and so are items tracked while the queue is full.
///
/// The background thread drives [`HttpClient::send_bytes`] with a minimal executor and no async
/// runtime. Use a client that does not need one, such as `reqwest::blocking::Client`. Clients
/// that need a Tokio reactor, like `reqwest::Client`, panic on every upload; the panic is caught
/// and logged as an error and the batch is dropped.
pub struct Channel<C> {
    endpoint: Arc<Uri>,
    instrumentation_key: String,
    sample_rate: f64,
    tags: Tags,
    sender: mpsc::SyncSender<Message>,
    stopped: AtomicBool,
    worker: Option<JoinHandle<()>>,
    _client: std::marker::PhantomData<fn() -> C>,
}

impl<C> Debug for Channel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.endpoint)
            .field("instrumentation_key", &self.instrumentation_key)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl Channel<()> {
    /// Configure a channel that sends to the instrumentation key using `client`.
    ///
    /// `client` must work without an async runtime, e.g. `reqwest::blocking::Client`.
    pub fn builder<C: HttpClient + 'static>(
        instrumentation_key: impl Into<String>,
        client: C,
    ) -> ChannelBuilder<C> {
        let mut tags = Tags::new();
        tags.insert(
            INTERNAL_SDK_VERSION,
            format!("rust:{}", env!("CARGO_PKG_VERSION")),
        );
        ChannelBuilder {
            instrumentation_key: instrumentation_key.into(),
            client,
            endpoint: track_endpoint(DEFAULT_BREEZE_ENDPOINT)
                .expect("default endpoint should always be valid"),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            send_interval: DEFAULT_SEND_INTERVAL,
            sample_rate: 100.0,
            tags,
            backoff: uploader::default_backoff(),
        }
    }
}

impl<C> Channel<C> {
    /// URI telemetry is posted to.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    fn create_envelope(&self, telemetry: Telemetry) -> Envelope {
        let sample_rate = match telemetry {
            Telemetry::Metric(_) | Telemetry::SampledMetric(_) => None,
            Telemetry::Event(_) | Telemetry::Trace(_) => Some(self.sample_rate),
        };
        Envelope {
            name: telemetry.envelope_name(),
            time: time_to_string(SystemTime::now()),
            sample_rate,
            i_key: Some(self.instrumentation_key.clone()),
            tags: Some(self.tags.clone()),
            data: Some(telemetry.into()),
        }
    }
}

impl<C: HttpClient + 'static> Transport for Channel<C> {
    fn track(&self, telemetry: Telemetry) {
        let mut envelope = self.create_envelope(telemetry);
        envelope.sanitize();
        match self.sender.try_send(Message::Track(envelope)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::warn!(
                target: "application_insights",
                "telemetry queue is full; dropping telemetry item"
            ),
            Err(TrySendError::Disconnected(_)) => {
                if !self.stopped.swap(true, Ordering::Relaxed) {
                    tracing::error!(
                        target: "application_insights",
                        "telemetry channel worker stopped; dropping all further telemetry"
                    );
                }
            }
        }
    }

    fn flush(&self) {
        let (done_sender, done_receiver) = mpsc::sync_channel(1);
        if self.sender.send(Message::Flush(done_sender)).is_ok() {
            let _ = done_receiver.recv();
        }
    }
}

impl<C> Drop for Channel<C> {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(
                    target: "application_insights",
                    "telemetry channel worker panicked"
                );
            }
        }
    }
}

struct Worker<C> {
    client: C,
    endpoint: Arc<Uri>,
    max_batch_size: usize,
    send_interval: Duration,
    backoff: ExponentialBuilder,
    buffer: Vec<Envelope>,
}

impl<C: HttpClient> Worker<C> {
    /// Next time the buffer is uploaded without a full batch, or `None` if the interval is too
    /// large to represent.
    fn next_deadline(&self) -> Option<Instant> {
        Instant::now().checked_add(self.send_interval)
    }

    fn run(mut self, receiver: mpsc::Receiver<Message>) {
        let mut deadline = self.next_deadline();
        loop {
            let message = match deadline {
                Some(deadline) => {
                    receiver.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match message {
                Ok(Message::Track(envelope)) => {
                    self.buffer.push(envelope);
                    if self.buffer.len() >= self.max_batch_size {
                        self.upload();
                        deadline = self.next_deadline();
                    }
                }
                Ok(Message::Flush(done)) => {
                    self.upload();
                    let _ = done.send(());
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.upload();
                    deadline = self.next_deadline();
                }
                Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    self.upload();
                    break;
                }
            }
        }
    }

    fn upload(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let items = std::mem::take(&mut self.buffer);
        let count = items.len();
        let upload = AssertUnwindSafe(|| {
            futures_executor::block_on(uploader::send(
                &self.client,
                &self.endpoint,
                items,
                self.backoff.clone(),
            ))
        });
        let Ok(result) = std::panic::catch_unwind(upload) else {
            tracing::error!(
                target: "application_insights",
                count,
                "http client panicked during upload; it must not require an async runtime"
            );
            return;
        };
        match result {
            Ok(()) => tracing::debug!(
                target: "application_insights",
                count,
                "uploaded telemetry"
            ),
            Err(err) => tracing::warn!(
                target: "application_insights",
                error = %err,
                count,
                "dropping telemetry after failed upload"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventTelemetry, MetricSample, Properties, SeverityLevel, TraceTelemetry};
    use bytes::Bytes;
    use flate2::read::GzDecoder;
    use http::{Request, Response};
    use opentelemetry_http::HttpError;
    use std::{
        collections::VecDeque,
        sync::{Condvar, Mutex},
    };

    #[derive(Debug, Clone, Default)]
    struct RecordingClient {
        requests: Arc<Mutex<Vec<Request<Bytes>>>>,
        statuses: Arc<Mutex<VecDeque<u16>>>,
    }

    impl RecordingClient {
        fn responding_with(statuses: &[u16]) -> Self {
            let client = Self::default();
            client.statuses.lock().unwrap().extend(statuses);
            client
        }

        fn bodies(&self) -> Vec<Vec<serde_json::Value>> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|request| {
                    let lines = std::io::read_to_string(GzDecoder::new(request.body().as_ref()))
                        .unwrap();
                    lines
                        .lines()
                        .map(|line| serde_json::from_str(line).unwrap())
                        .collect()
                })
                .collect()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for RecordingClient {
        async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
            let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
            self.requests.lock().unwrap().push(request);
            Ok(Response::builder().status(status).body(Bytes::new())?)
        }
    }

    /// Records the request, then blocks until [`GatedClient::open`] is called.
    #[derive(Debug, Clone, Default)]
    struct GatedClient {
        inner: RecordingClient,
        open: Arc<(Mutex<bool>, Condvar)>,
    }

    impl GatedClient {
        fn open(&self) {
            let (lock, cvar) = &*self.open;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for GatedClient {
        async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
            self.inner.requests.lock().unwrap().push(request);
            {
                let (lock, cvar) = &*self.open;
                let _open = cvar.wait_while(lock.lock().unwrap(), |open| !*open).unwrap();
            }
            Ok(Response::builder().status(200).body(Bytes::new())?)
        }
    }

    /// Panics on the first request, like an async client used outside a runtime.
    #[derive(Debug, Clone, Default)]
    struct PanicOnceClient {
        inner: RecordingClient,
        panicked: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl HttpClient for PanicOnceClient {
        async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("there is no reactor running");
            }
            self.inner.send_bytes(request).await
        }
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn event(name: &str) -> Telemetry {
        Telemetry::Event(EventTelemetry {
            name: name.into(),
            properties: Properties::new(),
        })
    }

    #[test]
    fn flush_uploads_buffered_items() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone()).build().unwrap();

        channel.track(event("first"));
        channel.track(event("second"));
        assert_eq!(0, client.request_count());
        channel.flush();

        let bodies = client.bodies();
        assert_eq!(1, bodies.len());
        assert_eq!(2, bodies[0].len());
        assert_eq!("first", bodies[0][0]["data"]["baseData"]["name"]);
        assert_eq!("second", bodies[0][1]["data"]["baseData"]["name"]);
        assert_eq!("key", bodies[0][0]["iKey"]);
    }

    #[test]
    fn request_format() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone()).build().unwrap();
        channel.track(event("e"));
        channel.flush();

        let requests = client.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(&http::Method::POST, request.method());
        assert_eq!(
            "https://dc.services.visualstudio.com/v2/track",
            request.uri().to_string()
        );
        assert_eq!(
            request.headers()[http::header::CONTENT_TYPE],
            "application/x-json-stream"
        );
        assert_eq!(request.headers()[http::header::CONTENT_ENCODING], "gzip");
    }

    #[test]
    fn full_batch_is_uploaded_without_flush() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone())
            .with_max_batch_size(2)
            .build()
            .unwrap();

        channel.track(event("1"));
        channel.track(event("2"));
        channel.track(event("3"));
        drop(channel);

        let sizes: Vec<_> = client.bodies().iter().map(Vec::len).collect();
        assert_eq!(vec![2, 1], sizes);
    }

    #[test]
    fn send_interval_triggers_upload() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone())
            .with_send_interval(Duration::from_millis(20))
            .build()
            .unwrap();

        channel.track(event("periodic"));
        wait_until(|| client.request_count() > 0);
        assert_eq!(1, client.request_count());
    }

    #[test]
    fn zero_send_interval_is_clamped() {
        let builder =
            Channel::builder("key", RecordingClient::default()).with_send_interval(Duration::ZERO);
        assert_eq!(MIN_SEND_INTERVAL, builder.send_interval);

        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone())
            .with_send_interval(Duration::ZERO)
            .build()
            .unwrap();
        channel.track(event("soon"));
        wait_until(|| client.request_count() > 0);
        assert_eq!(1, client.request_count());
    }

    #[test]
    fn unbounded_send_interval_disables_timer() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone())
            .with_send_interval(Duration::MAX)
            .build()
            .unwrap();

        channel.track(event("kept"));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(0, client.request_count());

        channel.flush();
        assert_eq!(1, client.request_count());

        channel.track(event("on drop"));
        drop(channel);
        assert_eq!(2, client.request_count());
    }

    #[test]
    fn full_queue_drops_items() {
        let client = GatedClient::default();
        let channel = Channel::builder("key", client.clone())
            .with_max_batch_size(1)
            .with_max_queue_size(2)
            .build()
            .unwrap();

        channel.track(event("in flight"));
        wait_until(|| client.inner.request_count() == 1);
        for i in 0..5 {
            channel.track(event(&i.to_string()));
        }
        client.open();
        drop(channel);

        let names: Vec<_> = client
            .inner
            .bodies()
            .iter()
            .map(|body| body[0]["data"]["baseData"]["name"].clone())
            .collect();
        assert_eq!(names, vec!["in flight", "0", "1"]);
    }

    #[test]
    fn panicking_client_does_not_stop_channel() {
        let client = PanicOnceClient::default();
        let channel = Channel::builder("key", client.clone()).build().unwrap();

        channel.track(event("lost"));
        channel.flush();
        channel.track(event("delivered"));
        channel.flush();

        let bodies = client.inner.bodies();
        assert_eq!(1, bodies.len());
        assert_eq!("delivered", bodies[0][0]["data"]["baseData"]["name"]);
    }

    #[test]
    fn drop_flushes() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone()).build().unwrap();
        channel.track(event("last words"));
        drop(channel);
        assert_eq!(1, client.request_count());
    }

    #[test]
    fn flush_without_items_sends_nothing() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone()).build().unwrap();
        channel.flush();
        drop(channel);
        assert_eq!(0, client.request_count());
    }

    #[test]
    fn transient_failures_are_retried() {
        let client = RecordingClient::responding_with(&[503, 429]);
        let channel = Channel::builder("key", client.clone())
            .with_retry_delay(Duration::from_millis(1))
            .build()
            .unwrap();
        channel.track(event("retried"));
        channel.flush();
        assert_eq!(3, client.request_count());
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let client = RecordingClient::responding_with(&[400]);
        let channel = Channel::builder("key", client.clone())
            .with_retry_delay(Duration::from_millis(1))
            .build()
            .unwrap();
        channel.track(event("rejected"));
        channel.flush();
        assert_eq!(1, client.request_count());
    }

    #[test]
    fn retries_are_bounded() {
        let client = RecordingClient::responding_with(&[503, 503, 503, 503, 503]);
        let channel = Channel::builder("key", client.clone())
            .with_retry_delay(Duration::from_millis(1))
            .with_max_retries(2)
            .build()
            .unwrap();
        channel.track(event("gave up"));
        channel.flush();
        assert_eq!(3, client.request_count());
    }

    #[test]
    fn envelope_contents() {
        let client = RecordingClient::default();
        let channel = Channel::builder("key", client.clone())
            .with_sample_rate(0.5)
            .with_application_version("1.2.3")
            .with_cloud_role("checkout")
            .with_cloud_role_instance("checkout-0")
            .build()
            .unwrap();

        channel.track(Telemetry::Trace(TraceTelemetry {
            message: "hello".into(),
            severity_level: SeverityLevel::Warning,
            properties: [("k".to_string(), "v".to_string())].into(),
        }));
        channel.track(Telemetry::Metric(MetricSample {
            name: "m".into(),
            value: 1.0,
            properties: Properties::new(),
        }));
        channel.flush();

        let bodies = client.bodies();
        let trace = &bodies[0][0];
        assert_eq!("Microsoft.ApplicationInsights.Message", trace["name"]);
        assert_eq!(50.0, trace["sampleRate"]);
        assert_eq!("MessageData", trace["data"]["baseType"]);
        assert_eq!(2, trace["data"]["baseData"]["severityLevel"]);
        assert_eq!("v", trace["data"]["baseData"]["properties"]["k"]);
        assert_eq!("1.2.3", trace["tags"]["ai.application.ver"]);
        assert_eq!("checkout", trace["tags"]["ai.cloud.role"]);
        assert_eq!("checkout-0", trace["tags"]["ai.cloud.roleInstance"]);
        assert_eq!(
            format!("rust:{}", env!("CARGO_PKG_VERSION")),
            trace["tags"]["ai.internal.sdkVersion"]
        );

        let metric = &bodies[0][1];
        assert_eq!("Microsoft.ApplicationInsights.Metric", metric["name"]);
        assert!(metric.get("sampleRate").is_none());
        assert_eq!("Measurement", metric["data"]["baseData"]["metrics"][0]["kind"]);
    }

    #[test]
    fn custom_endpoint() {
        let channel = Channel::builder("key", RecordingClient::default())
            .with_endpoint("http://localhost:8080/")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            "https://localhost:8080/v2/track",
            channel.endpoint().to_string()
        );
    }

    #[test]
    fn invalid_endpoint() {
        let err = Channel::builder("key", RecordingClient::default())
            .with_endpoint("https://in valid")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)));
    }
}
