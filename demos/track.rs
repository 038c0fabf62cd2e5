use application_insights_telemetry::{
    Environment, Properties, SampledMetric, SeverityLevel, TelemetryClient,
};
use std::error::Error;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Reads APPLICATIONINSIGHTS_INSTRUMENTATIONKEY and, optionally,
    // APPLICATIONINSIGHTS_ENDPOINTADDRESS.
    let client = TelemetryClient::new("", &Environment, reqwest::blocking::Client::new())?;

    let mut properties = Properties::new();
    properties.insert("env".into(), "demo".into());

    client.track_event("Demo.Started", &properties)?;
    client.track_metric("demo.items", 3.0, &properties)?;
    client.track_sampled_metric(
        SampledMetric::new("demo.duration", 120.0)
            .with_count(3)
            .with_min(20.0)
            .with_max(60.0),
        &properties,
    )?;
    client.track_trace("demo finished", SeverityLevel::Information, &properties)?;

    client.flush();
    Ok(())
}
