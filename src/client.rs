use crate::{
    config::{resolve_instrumentation_key, ConfigurationProvider, ENDPOINT_ADDRESS_SETTING},
    error::ensure_not_blank,
    Channel, Error, EventTelemetry, InvalidArgumentError, MetricSample, Properties,
    SampledMetric, SampledMetricSummary, SeverityLevel, Telemetry, TraceTelemetry, Transport,
};
use opentelemetry_http::HttpClient;

/// Validates telemetry and forwards it to a [`Transport`].
///
/// The instrumentation key is resolved once at construction and never changes. All tracking
/// methods take `&self` and can be called from many threads at once; buffering and delivery
/// happen inside the transport.
#[derive(Debug)]
pub struct TelemetryClient<T> {
    instrumentation_key: String,
    transport: T,
}

impl<C: HttpClient + 'static> TelemetryClient<Channel<C>> {
    /// Create a client that uploads through a [`Channel`] using `http_client`.
    ///
    /// If `instrumentation_key` is blank it is read from the
    /// [`INSTRUMENTATION_KEY_SETTING`](crate::INSTRUMENTATION_KEY_SETTING) setting of `config`.
    /// The optional [`ENDPOINT_ADDRESS_SETTING`](crate::ENDPOINT_ADDRESS_SETTING) overrides the
    /// ingestion endpoint.
    ///
    /// `http_client` is driven from a background thread without an async runtime, so it must be
    /// a blocking client such as `reqwest::blocking::Client`. See [`Channel`].
    ///
    /// ```no_run
    /// # #[cfg(feature = "reqwest-client")] {
    /// use application_insights_telemetry::{Environment, TelemetryClient};
    ///
    /// let client = TelemetryClient::new("", &Environment, reqwest::blocking::Client::new())
    ///     .expect("APPLICATIONINSIGHTS_INSTRUMENTATIONKEY is set");
    /// # }
    /// ```
    pub fn new(
        instrumentation_key: impl AsRef<str>,
        config: &dyn ConfigurationProvider,
        http_client: C,
    ) -> Result<Self, Error> {
        let instrumentation_key = resolve_instrumentation_key(instrumentation_key.as_ref(), config)?;

        let mut channel = Channel::builder(instrumentation_key.clone(), http_client);
        if let Some(address) = config
            .get(ENDPOINT_ADDRESS_SETTING)
            .filter(|address| !address.trim().is_empty())
        {
            channel = channel.with_endpoint(&address)?;
        }

        Ok(Self {
            instrumentation_key,
            transport: channel.build()?,
        })
    }
}

impl<T: Transport> TelemetryClient<T> {
    /// Create a client that forwards to an existing transport.
    ///
    /// The key is resolved the same way as in [`TelemetryClient::new`].
    pub fn with_transport(
        instrumentation_key: impl AsRef<str>,
        config: &dyn ConfigurationProvider,
        transport: T,
    ) -> Result<Self, Error> {
        let instrumentation_key = resolve_instrumentation_key(instrumentation_key.as_ref(), config)?;
        Ok(Self {
            instrumentation_key,
            transport,
        })
    }

    /// Instrumentation key used to write to Application Insights.
    pub fn instrumentation_key(&self) -> &str {
        &self.instrumentation_key
    }

    /// The transport telemetry is forwarded to.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Record a single measurement of a metric.
    pub fn track_metric(
        &self,
        name: &str,
        value: f64,
        properties: &Properties,
    ) -> Result<(), InvalidArgumentError> {
        let name = ensure_not_blank(name, "name")?;

        self.transport.track(Telemetry::Metric(MetricSample {
            name: name.to_string(),
            value,
            properties: properties.clone(),
        }));
        Ok(())
    }

    /// Record a pre-aggregated metric. Unset optional fields are forwarded as unset.
    pub fn track_sampled_metric(
        &self,
        metric: SampledMetric,
        properties: &Properties,
    ) -> Result<(), InvalidArgumentError> {
        ensure_not_blank(&metric.name, "name")?;

        self.transport
            .track(Telemetry::SampledMetric(SampledMetricSummary {
                metric,
                properties: properties.clone(),
            }));
        Ok(())
    }

    /// Record a named event.
    pub fn track_event(
        &self,
        name: &str,
        properties: &Properties,
    ) -> Result<(), InvalidArgumentError> {
        let name = ensure_not_blank(name, "name")?;

        self.transport.track(Telemetry::Event(EventTelemetry {
            name: name.to_string(),
            properties: properties.clone(),
        }));
        Ok(())
    }

    /// Record a trace message with the given severity.
    pub fn track_trace(
        &self,
        message: &str,
        severity_level: SeverityLevel,
        properties: &Properties,
    ) -> Result<(), InvalidArgumentError> {
        let message = ensure_not_blank(message, "message")?;

        self.transport.track(Telemetry::Trace(TraceTelemetry {
            message: message.to_string(),
            severity_level,
            properties: properties.clone(),
        }));
        Ok(())
    }

    /// Ask the transport to deliver everything tracked so far.
    pub fn flush(&self) {
        self.transport.flush();
    }
}
