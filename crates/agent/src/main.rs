//! Runs one device component against NATS, the in-process broker, or nothing.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use edgelink_agent::components::cloud_publisher::{self, CloudPublisherConfig};
use edgelink_agent::components::controller;
use edgelink_agent::components::processor::{self, ProcessorConfig};
use edgelink_agent::components::publisher::{self, PublisherConfig};
use edgelink_agent::components::subscriber::{self, SubscriberConfig};
use edgelink_messaging::{ConnectionError, MessagingClient, MessagingOptions, QoS, Transport};
use edgelink_messaging_memory::MemoryBroker;
use edgelink_messaging_nats::{NatsConnector, NatsConnectorOptions};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Agent(#[from] edgelink_agent::Error),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("could not set global default subscriber: {0}")]
    SetTracing(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BrokerKind {
    /// Log what would be sent without connecting.
    #[value(name = "none")]
    Simulation,

    /// In-process broker, useful for local development.
    Memory,

    /// NATS server at `--nats-url`. Falls back to simulation if unreachable.
    Nats,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Broker to connect to
    #[arg(long, value_enum, env = "EDGELINK_BROKER", default_value = "nats")]
    broker: BrokerKind,

    /// NATS server URL
    #[arg(long, env = "EDGELINK_NATS_URL", default_value = "nats://127.0.0.1:4222")]
    nats_url: String,

    /// Log filter, e.g. `info` or `edgelink_messaging=debug`
    #[arg(long, env = "EDGELINK_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Seconds to wait for an at-least-once acknowledgement
    #[arg(long, env = "EDGELINK_ACK_TIMEOUT", default_value_t = 10)]
    ack_timeout: u64,

    /// Default delivery guarantee (`at-most-once` or `at-least-once`)
    #[arg(long, env = "EDGELINK_QOS", default_value = "at-least-once")]
    qos: QoS,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish synthesized sensor readings on an interval
    Publish {
        #[arg(long, env = "EDGELINK_TOPIC", default_value = "local/sensor/data")]
        channel: String,

        /// Seconds between readings
        #[arg(long, env = "EDGELINK_INTERVAL", default_value_t = 15)]
        interval: u64,

        #[arg(long, env = "EDGELINK_MESSAGE_TYPE", default_value = "sensor-reading")]
        message_type: String,

        #[arg(long, env = "EDGELINK_DEVICE_ID", default_value = "ipc-sensor-001")]
        device_id: String,
    },

    /// Publish single-value cloud telemetry on an interval
    PublishCloud {
        #[arg(long, env = "EDGELINK_CLOUD_TOPIC", default_value = "sensor/data")]
        channel: String,

        /// Seconds between readings
        #[arg(long, env = "EDGELINK_CLOUD_INTERVAL", default_value_t = 30)]
        interval: u64,

        #[arg(long, env = "EDGELINK_DEVICE_ID", default_value = "sensor-001")]
        device_id: String,

        #[arg(long, env = "EDGELINK_SENSOR_TYPE", default_value = "temperature")]
        sensor_type: String,

        #[arg(long, env = "EDGELINK_MIN_VALUE", default_value_t = 20.0)]
        min_value: f64,

        #[arg(long, env = "EDGELINK_MAX_VALUE", default_value_t = 30.0)]
        max_value: f64,
    },

    /// Log every message on a set of channels
    Subscribe {
        /// Comma separated channel patterns
        #[arg(
            long,
            env = "EDGELINK_TOPICS",
            value_delimiter = ',',
            default_value = "local/sensor/data,local/alerts/*"
        )]
        channels: Vec<String>,

        /// Append messages to this file
        #[arg(long, env = "EDGELINK_OUTPUT_FILE")]
        output_file: Option<PathBuf>,

        /// Warn when a reading exceeds this temperature
        #[arg(long, env = "EDGELINK_ALERT_THRESHOLD", default_value_t = 30.0)]
        alert_threshold: f64,
    },

    /// Forward hot temperature samples as alerts
    Process {
        #[arg(long, env = "EDGELINK_INPUT_TOPIC", default_value = "sensors/temperature")]
        input: String,

        #[arg(long, env = "EDGELINK_ALERT_TOPIC", default_value = "component/alerts")]
        output: String,

        #[arg(long, env = "EDGELINK_THRESHOLD", default_value_t = 80.0)]
        threshold: f64,
    },

    /// Answer `get_status` commands with telemetry
    Controller {
        #[arg(long, env = "EDGELINK_DEVICE_ID", default_value = "device1")]
        device_id: String,
    },
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!(error = %e, "failed to listen for ctrl-c");
                        }
                    }
                    _ = terminate.recv() => info!("received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
    }
}

async fn run<T>(
    client: MessagingClient<T>,
    command: Command,
    qos: QoS,
    shutdown: CancellationToken,
) -> Result<(), Error>
where
    T: Transport,
{
    let result = match command {
        Command::Publish {
            channel,
            interval,
            message_type,
            device_id,
        } => {
            let config = PublisherConfig {
                channel,
                interval: Duration::from_secs(interval.max(1)),
                message_type,
                device_id,
                qos,
            };
            publisher::run(&client, &config, shutdown)
                .await
                .map(|published| info!(published, "done"))
        }
        Command::PublishCloud {
            channel,
            interval,
            device_id,
            sensor_type,
            min_value,
            max_value,
        } => {
            let config = CloudPublisherConfig {
                channel,
                interval: Duration::from_secs(interval.max(1)),
                device_id,
                sensor_type,
                min_value,
                max_value,
                qos,
            };
            cloud_publisher::run(&client, &config, shutdown)
                .await
                .map(|published| info!(published, "done"))
        }
        Command::Subscribe {
            channels,
            output_file,
            alert_threshold,
        } => {
            let config = SubscriberConfig {
                channels,
                output_file,
                alert_threshold,
            };
            subscriber::run(&client, &config, shutdown)
                .await
                .map(|handler| {
                    info!(
                        received = handler.received(),
                        alerts = handler.alerts(),
                        "done"
                    );
                })
        }
        Command::Process {
            input,
            output,
            threshold,
        } => {
            let config = ProcessorConfig {
                input_channel: input,
                alert_channel: output,
                threshold,
            };
            processor::run(&client, &config, shutdown).await
        }
        Command::Controller { device_id } => controller::run(&client, &device_id, shutdown).await,
    };

    if let Err(e) = client.close().await {
        warn!(error = %e, "failed to close connection");
    }
    result.map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::try_new(&args.log_level)?)
            .finish(),
    )?;

    let options = MessagingOptions {
        default_qos: args.qos,
        ack_timeout: Duration::from_secs(args.ack_timeout),
        simulate: args.broker == BrokerKind::Simulation,
        ..MessagingOptions::default()
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutting down");
            shutdown.cancel();
        });
    }

    match args.broker {
        BrokerKind::Memory => {
            let broker = MemoryBroker::default();
            let client = MessagingClient::connect(&broker.connector(), options).await?;
            info!("connected to in-process broker");
            run(client, args.command, args.qos, shutdown).await
        }
        BrokerKind::Nats | BrokerKind::Simulation => {
            let connector = NatsConnector::new(NatsConnectorOptions {
                url: args.nats_url,
                name: Some("edgelink-agent".to_string()),
                ..NatsConnectorOptions::default()
            });
            let client = MessagingClient::connect_or_simulate(&connector, options).await;
            run(client, args.command, args.qos, shutdown).await
        }
    }
}
