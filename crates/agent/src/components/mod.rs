/// Publishes single-value telemetry towards the cloud.
pub mod cloud_publisher;

/// Answers cloud commands with status telemetry.
pub mod controller;

/// Forwards hot temperature samples as alerts.
pub mod processor;

/// Periodically publishes synthesized sensor readings.
pub mod publisher;

/// Logs traffic on a set of channels.
pub mod subscriber;
