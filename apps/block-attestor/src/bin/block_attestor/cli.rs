//! Defines the client interface for the attestor server.
use block_attestor::logging::LogFormat;
use clap::{Parser, ValueEnum};

/// The KMS backend holding the signing key
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KmsType {
    /// Cloud KMS reached over HTTPS
    Cloud,
    /// Hex encoded key file on local disk
    Local,
}

#[derive(Clone, Debug, Parser)]
#[command(
    name = "block_attestor",
    version,
    about = "Block Attestor - signed proofs that EVM blocks have been mined",
    long_about = "A service that signs (blockNumber, chainId) attestations with a KMS held key once the block is mined.\nSupports key management and running the attestation server."
)]
/// The command line interface for the attestor.
pub struct AttestorCli {
    /// Log line format.
    #[clap(long, value_enum, global = true, default_value = "json")]
    pub log_format: LogFormat,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The subcommands for the attestor.
#[derive(Clone, Debug, Parser)]
pub enum Commands {
    /// The subcommand to run the server.
    Server(server::Args),

    /// The subcommand to run key management program.
    #[command(subcommand)]
    Key(key::KeyCommands),
}

/// The arguments for the start subcommand.
pub mod server {
    use super::{KmsType, Parser};

    /// The arguments for the server subcommand.
    #[derive(Clone, Debug, Parser)]
    pub struct Args {
        /// The configuration file for the attestor.
        #[clap(long)]
        pub config: String,

        /// The KMS backend to use.
        #[clap(long, value_enum, default_value = "cloud")]
        pub kms_type: KmsType,
    }
}

/// The arguments for the key subcommand.
pub mod key {
    use std::path::PathBuf;

    use super::{KmsType, Parser};

    #[derive(Clone, Debug, Parser)]
    pub enum KeyCommands {
        /// Generate a local key file.
        Generate(GenerateArgs),
        /// Print the signer address for a configured KMS key.
        Show(ShowArgs),
    }

    #[derive(Clone, Debug, Parser)]
    pub struct GenerateArgs {
        /// Directory the key file is written to. If not specified, uses ~/.block-attestor/
        #[clap(long)]
        pub out: Option<PathBuf>,
    }

    #[derive(Clone, Debug, Parser)]
    pub struct ShowArgs {
        /// The configuration file naming the KMS key.
        #[clap(long)]
        pub config: String,

        /// The KMS backend to use.
        #[clap(long, value_enum, default_value = "cloud")]
        pub kms_type: KmsType,
    }
}
