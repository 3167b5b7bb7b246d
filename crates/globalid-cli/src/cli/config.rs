use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use globalid::{DEFAULT_NODE_ID, GlobalId};

/// Command-line interface for the `globalid` binary.
///
/// Generation settings are parsed from CLI arguments or environment variables
/// (a `.env` file is loaded before parsing).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "globalid",
    version,
    about = "Issue and decode coordination-free 64-bit IDs"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Initialize a generator for this node and issue IDs.
    Generate(GenerateArgs),
    /// Split existing IDs into node ID, epoch second and serial.
    Decode(DecodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Node ID stamped into every ID (0-1023).
    ///
    /// Must be unique among all processes issuing IDs at the same time.
    ///
    /// Environment variable: `GLOBALID_NODE_ID`
    #[arg(short, long, env = "GLOBALID_NODE_ID", default_value_t = DEFAULT_NODE_ID)]
    pub node_id: u16,

    /// Number of IDs to issue.
    ///
    /// Environment variable: `GLOBALID_COUNT`
    #[arg(short, long, env = "GLOBALID_COUNT", default_value_t = 1)]
    pub count: usize,

    /// Number of threads sharing the generator.
    ///
    /// Environment variable: `GLOBALID_THREADS`
    #[arg(short, long, env = "GLOBALID_THREADS", default_value_t = 1)]
    pub threads: usize,

    /// Output format, one ID per line.
    ///
    /// Environment variable: `GLOBALID_FORMAT`
    #[arg(short, long, env = "GLOBALID_FORMAT", value_enum, default_value_t = IdFormat::Decimal)]
    pub format: IdFormat,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// IDs to decode, in decimal or `0x`-prefixed hex.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

/// How an ID is printed.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdFormat {
    /// The integer in base 10.
    #[default]
    Decimal,
    /// `0x` followed by 16 hex digits.
    Hex,
    /// The integer followed by its decoded fields.
    Parts,
}

impl IdFormat {
    pub fn render(self, id: GlobalId) -> String {
        match self {
            Self::Decimal => id.to_string(),
            Self::Hex => format!("{:#018x}", id.to_raw()),
            Self::Parts => format!(
                "{id} node={} seconds={} serial={}",
                id.node_id(),
                id.seconds(),
                id.serial()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub node_id: u16,
    pub count: usize,
    pub threads: usize,
    pub format: IdFormat,
}

impl TryFrom<GenerateArgs> for GenerateConfig {
    type Error = anyhow::Error;

    fn try_from(args: GenerateArgs) -> Result<Self, Self::Error> {
        let max_node_id = GlobalId::max_node_id();

        if u64::from(args.node_id) > max_node_id {
            bail!(
                "GLOBALID_NODE_ID ({}) exceeds the node ID space (max = {})",
                args.node_id,
                max_node_id
            );
        }

        if args.count == 0 {
            bail!("GLOBALID_COUNT must be greater than 0");
        }

        if args.threads == 0 {
            bail!("GLOBALID_THREADS must be greater than 0");
        }

        Ok(Self {
            node_id: args.node_id,
            count: args.count,
            // Idle threads would only contend for the lock.
            threads: args.threads.min(args.count),
            format: args.format,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DecodeConfig {
    pub ids: Vec<GlobalId>,
}

impl TryFrom<DecodeArgs> for DecodeConfig {
    type Error = anyhow::Error;

    fn try_from(args: DecodeArgs) -> Result<Self, Self::Error> {
        let ids = args
            .ids
            .iter()
            .map(String::as_str)
            .map(parse_id)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { ids })
    }
}

/// Parses a decimal or `0x`-prefixed hex ID, rejecting anything with the
/// reserved bit set.
pub fn parse_id(input: &str) -> anyhow::Result<GlobalId> {
    let input = input.trim();
    let raw = if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex id `{input}`"))?
    } else if input.starts_with('-') {
        let signed: i64 = input
            .parse()
            .with_context(|| format!("invalid id `{input}`"))?;
        return Ok(GlobalId::try_from(signed)?);
    } else {
        input
            .parse::<u64>()
            .with_context(|| format!("invalid id `{input}`"))?
    };
    Ok(GlobalId::try_from(raw)?)
}
