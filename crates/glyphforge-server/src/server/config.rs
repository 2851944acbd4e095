use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;

/// Runtime configuration for the `glyphforge-server` binary.
///
/// These settings control where assets and working scopes live, the bounds
/// enforced on uploads, and how the external font toolchain is invoked. All
/// values are parsed from CLI arguments or environment variables, with
/// reasonable defaults suitable for production.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "glyphforge-server",
    version,
    about = "An HTTP service that turns uploaded SVG glyphs into downloadable icon-font bundles"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `LISTEN_ADDR`
    #[arg(long, env = "LISTEN_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub listen_addr: String,

    /// Directory holding uploaded glyph assets, flat, one file per
    /// identifier. Created at startup if absent.
    ///
    /// Environment variable: `ASSETS_DIR`
    #[arg(long, env = "ASSETS_DIR", default_value = "data/assets")]
    pub assets_dir: PathBuf,

    /// Directory under which per-request working scopes and archive blobs
    /// are created. Created at startup if absent.
    ///
    /// Environment variable: `WORK_DIR`
    #[arg(long, env = "WORK_DIR", default_value = "data/work")]
    pub work_dir: PathBuf,

    /// Maximum number of files accepted in one upload batch.
    ///
    /// Enforced server-side to prevent abuse from overly large batches.
    ///
    /// Environment variable: `MAX_BATCH_FILES`
    #[arg(long, env = "MAX_BATCH_FILES", default_value_t = 50)]
    pub max_batch_files: usize,

    /// Maximum accepted request body size in bytes, uploads included.
    ///
    /// Environment variable: `MAX_BODY_BYTES`
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// External font toolchain command invoked to synthesize fonts. See
    /// the README for the invocation contract.
    ///
    /// Environment variable: `SYNTH_COMMAND`
    #[arg(long, env = "SYNTH_COMMAND", default_value = "glyphforge-synth")]
    pub synth_command: String,

    /// Extra arguments passed to the synthesis command before the
    /// pipeline-provided ones. Repeat the flag once per argument.
    ///
    /// Environment variable: `SYNTH_ARGS` (space-separated)
    #[arg(long = "synth-arg", env = "SYNTH_ARGS", value_delimiter = ' ')]
    pub synth_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub assets_dir: PathBuf,
    pub work_dir: PathBuf,
    pub max_batch_files: usize,
    pub max_body_bytes: usize,
    pub synth_command: String,
    pub synth_args: Vec<String>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_batch_files == 0 {
            bail!("MAX_BATCH_FILES must be greater than 0");
        }

        if args.max_body_bytes == 0 {
            bail!("MAX_BODY_BYTES must be greater than 0");
        }

        if args.synth_command.trim().is_empty() {
            bail!("SYNTH_COMMAND must not be empty");
        }

        // The bulk-cleanup sweep enumerates the assets directory wholesale;
        // sharing it with the work area would make the sweep eat scopes.
        if args.assets_dir == args.work_dir {
            bail!("ASSETS_DIR and WORK_DIR must be distinct directories");
        }

        Ok(Self {
            listen_addr: args.listen_addr,
            assets_dir: args.assets_dir,
            work_dir: args.work_dir,
            max_batch_files: args.max_batch_files,
            max_body_bytes: args.max_body_bytes,
            synth_command: args.synth_command,
            synth_args: args.synth_args,
        })
    }
}
