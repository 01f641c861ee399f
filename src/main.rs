use std::process::ExitCode;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};

use volback::api::{ApiServer, AppContext};
use volback::config::{AgentArgs, BackupJobConfig, Cli, Commands, ServeArgs};
use volback::domain::lifecycle::{AgentJob, BackupLifecycle};
use volback::infrastructure::aws::{
    AsgFleetControl, Ec2Provisioner, Ec2VolumeAttacher, S3Location, S3ObjectStore,
};
use volback::infrastructure::block_device::NvmeDeviceProbe;
use volback::infrastructure::clock::SystemClock;
use volback::infrastructure::mount::SystemMounter;
use volback::infrastructure::{imds, logging};

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_global_hooks();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => run_serve(args).await.map(|()| ExitCode::SUCCESS),
        Commands::Agent(args) => run_agent(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("volback failed: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Control plane: validate configuration once, then serve the two
/// operations until interrupted.
async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    logging::init();
    info!("Starting volback control plane");

    let job = BackupJobConfig::from_args(&args)?;

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let context = Arc::new(AppContext {
        fleet_control: Arc::new(AsgFleetControl::new(aws_sdk_autoscaling::Client::new(
            &aws_config,
        ))),
        provisioner: Arc::new(Ec2Provisioner::new(aws_sdk_ec2::Client::new(&aws_config))),
        fleet_name: args.fleet_name.clone(),
        job,
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    ApiServer::new(context, args.listen_addr)
        .run(shutdown_rx)
        .await
        .map_err(|report| anyhow::anyhow!("{report}"))
}

/// Worker side: identify this instance, then run the lifecycle stages.
/// Exit code 0 on success, 1 for a missing block device, 2 otherwise.
async fn run_agent(args: AgentArgs) -> anyhow::Result<ExitCode> {
    logging::init();
    info!(volume_id = args.volume_id, "Starting volback agent");

    let identity = imds::fetch_identity().await?;
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(identity.region.clone()))
        .load()
        .await;

    let ec2 = aws_sdk_ec2::Client::new(&aws_config);
    let attacher = Ec2VolumeAttacher::new(ec2.clone());
    let provisioner = Ec2Provisioner::new(ec2);
    let store = S3ObjectStore::new(
        aws_sdk_s3::Client::new(&aws_config),
        S3Location::parse(&args.destination)?,
    );
    let probe = NvmeDeviceProbe::new();
    let mounter = SystemMounter::new();
    let clock = SystemClock;

    let lifecycle = BackupLifecycle::new(
        &attacher,
        &provisioner,
        &probe,
        &mounter,
        &store,
        &clock,
        AgentJob {
            volume_id: args.volume_id,
            mount_point: args.mount_point,
            instance_id: identity.instance_id,
        },
    );

    match lifecycle.run().await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Backup job failed: {e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
