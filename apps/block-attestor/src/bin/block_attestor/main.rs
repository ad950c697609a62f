use std::{env, fs, path::PathBuf, sync::Arc};

use block_attestor::{
    config::AttestorConfig,
    kms::{
        cloud::{CloudKms, CloudKmsConfig},
        local::{LocalKms, LocalKmsConfig, DEFAULT_KEY_FILE_NAME},
        KmsBuilder,
    },
    logging::init_logging,
    mined::{CachedBlockHeight, MinedBlockGate, RateLimiter},
    rpc::{health_server, server, AttestorService, RpcError},
    signer::kms::KmsSigner,
    upstream::{
        evm::{EvmUpstreamBuilder, EvmUpstreamConfig},
        UpstreamBuilder,
    },
};
use clap::Parser;
use ethereum_keys::address::address_hex;
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::broadcast,
    task::JoinHandle,
};
use tracing::info;

use crate::cli::{key::KeyCommands, AttestorCli, Commands, KmsType};

mod cli;

/// Default attestor dir
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined
fn default_attestor_dir() -> Result<PathBuf, anyhow::Error> {
    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("unable to determine home directory from environment"))?;
    Ok(PathBuf::from(home).join(".block-attestor"))
}

async fn run_server_with_kms<K: KmsBuilder>(
    config: AttestorConfig<EvmUpstreamConfig, K::Config>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<JoinHandle<Result<(), RpcError>>, anyhow::Error> {
    let upstream = EvmUpstreamBuilder::build(config.upstream)?;
    let chain_id = match config.attestation.chain_id {
        Some(chain_id) => chain_id,
        None => {
            let chain_id = upstream.chain_id().await?;
            info!(chainId = chain_id, "chain id read from upstream");
            chain_id
        }
    };

    let key_ref = K::key_ref(&config.kms);
    let kms = K::build(config.kms)?;
    let signer = KmsSigner::new(kms, key_ref, chain_id).await?;
    info!(
        kms = K::kms_name(),
        address = %address_hex(&signer.identity().address()),
        chainId = chain_id,
        "signer initialized"
    );

    let gate = MinedBlockGate::new(
        upstream,
        Arc::new(CachedBlockHeight::new(0)),
        Arc::new(RateLimiter::new(
            config.attestation.block_interval(),
            config.attestation.burst,
        )),
    );
    let service = Arc::new(AttestorService::new(
        gate,
        EvmUpstreamBuilder::upstream_name(),
        signer,
        K::kms_name(),
        chain_id,
    ));

    Ok(tokio::spawn(async move {
        server::start(config.server.listen_addr, service, shutdown_rx).await
    }))
}

async fn show_signer<K: KmsBuilder>(config_path: &str) -> Result<(), anyhow::Error>
where
    K::Config: for<'de> serde::Deserialize<'de>,
{
    let config = AttestorConfig::<EvmUpstreamConfig, K::Config>::from_file(config_path)?;
    let key_ref = K::key_ref(&config.kms);
    let kms = K::build(config.kms)?;
    // The chain id only matters for transactions, which are not signed here.
    let chain_id = config.attestation.chain_id.unwrap_or_default();
    let signer = KmsSigner::new(kms, key_ref, chain_id).await?;

    println!("{}", address_hex(&signer.identity().address()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = AttestorCli::parse();

    match cli.command {
        Commands::Server(args) => {
            let tracer_provider = init_logging(cli.log_format);

            // Create shutdown broadcast channel
            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

            let (health_addr, rpc_handle) = match args.kms_type {
                KmsType::Cloud => {
                    let config =
                        AttestorConfig::<EvmUpstreamConfig, CloudKmsConfig>::from_file(args.config)?;
                    let health_addr = config.server.health_addr();
                    let handle = run_server_with_kms::<CloudKms>(config, shutdown_rx).await?;
                    (health_addr, handle)
                }
                KmsType::Local => {
                    let config =
                        AttestorConfig::<EvmUpstreamConfig, LocalKmsConfig>::from_file(args.config)?;
                    let health_addr = config.server.health_addr();
                    let handle = run_server_with_kms::<LocalKms>(config, shutdown_rx).await?;
                    (health_addr, handle)
                }
            };

            // Start health server after main server is initialized
            let health_shutdown_rx = shutdown_tx.subscribe();
            let health_handle = tokio::spawn(async move {
                health_server::start(health_addr, health_shutdown_rx).await
            });

            wait_for_shutdown_signal().await?;
            info!("shutdown signal received, starting graceful shutdown");
            let _ = shutdown_tx.send(());

            // Wait for both servers to shut down
            let (rpc_result, health_result) = tokio::join!(rpc_handle, health_handle);
            if let Err(e) = tracer_provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
            rpc_result??;
            health_result??;
        }
        Commands::Key(cmd) => match cmd {
            KeyCommands::Generate(args) => {
                let attestor_dir = match args.out {
                    Some(path) => path,
                    None => default_attestor_dir()?,
                };
                if !attestor_dir.exists() {
                    fs::create_dir_all(&attestor_dir)?;
                }
                let key_path = attestor_dir.join(DEFAULT_KEY_FILE_NAME);

                let kms = LocalKms::random();
                kms.write_to_file(&key_path)?;
                let address = ethereum_keys::address::address_from_public_key(&kms.public_key());
                println!("key successfully saved to {}", key_path.display());
                println!("{}", address_hex(&address));
            }
            KeyCommands::Show(args) => match args.kms_type {
                KmsType::Cloud => show_signer::<CloudKms>(&args.config).await?,
                KmsType::Local => show_signer::<LocalKms>(&args.config).await?,
            },
        },
    }
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<(), anyhow::Error> {
    let mut signal_terminate = signal(SignalKind::terminate())?;
    let mut signal_interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = signal_terminate.recv() => info!("received SIGTERM signal"),
        _ = signal_interrupt.recv() => info!("received SIGINT signal (Ctrl+C)"),
    };
    Ok(())
}
