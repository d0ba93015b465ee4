use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rwnx_platform::firmware::{self, DirectoryStore, FirmwareStore, MacFlavor, PhyProfile};
use rwnx_platform::platform::{FirmwareSelection, PlatformController};
use rwnx_platform::regulatory::{self, channel_to_freq};
use rwnx_platform::{
    Band, Bandwidth, FirmwareMode, MockBus, PlatformConfig, PowerLimit, UserConfig,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "RWNX platform tool for AIC8800 devices", long_about = None)]
struct Args {
    /// Platform configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the firmware set for a mode and check it against a directory
    Firmware {
        /// Firmware directory (overrides the config file)
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Use the fhost MAC firmware instead of fullmac
        #[arg(long)]
        fhost: bool,
        /// Use the Karst PHY profile instead of Trident
        #[arg(long)]
        karst: bool,
        #[arg(long)]
        tl4: bool,
        #[arg(long)]
        dpd: bool,
    },
    /// Resolve a country code to its regulatory region
    Region { country_code: String },
    /// Look up a power limit
    PowerLimit {
        /// Power-limit table (overrides the config file)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Country code (overrides the config file)
        #[arg(long)]
        country: Option<String>,
        #[arg(long, conflicts_with = "freq")]
        channel: Option<u16>,
        /// Center frequency in MHz
        #[arg(long)]
        freq: Option<u16>,
        #[arg(long, default_value_t = 20)]
        bw: u16,
    },
    /// Parse a user configuration file and report what was applied
    Userconfig {
        /// User configuration file (overrides the config file)
        file: Option<PathBuf>,
    },
    /// Run enable/disable/deinit against a simulated bus
    Simulate {
        /// Number of disable/enable cycles
        #[arg(long, default_value_t = 1)]
        cycles: u32,
    },
    /// Write a default configuration file
    InitConfig { path: PathBuf },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ModeArg {
    Normal,
    RfTest,
    BleScanWakeup,
    M2dOta,
    DpdCalib,
    BleScanAdFilter,
}

impl From<ModeArg> for FirmwareMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Normal => FirmwareMode::Normal,
            ModeArg::RfTest => FirmwareMode::RfTest,
            ModeArg::BleScanWakeup => FirmwareMode::BleScanWakeup,
            ModeArg::M2dOta => FirmwareMode::M2dOta,
            ModeArg::DpdCalib => FirmwareMode::DpdCalib,
            ModeArg::BleScanAdFilter => FirmwareMode::BleScanAdFilter,
        }
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PlatformConfig::load_from_file(path)?,
        None => PlatformConfig::default(),
    };

    match args.command {
        Command::Firmware {
            dir,
            mode,
            fhost,
            karst,
            tl4,
            dpd,
        } => {
            if let Some(dir) = dir {
                config.firmware_dir = dir;
            }
            if let Some(mode) = mode {
                config.mode = mode.into();
            }
            if fhost {
                config.variant.mac = MacFlavor::FHost;
            }
            if karst {
                config.variant.phy = PhyProfile::Karst;
            }
            config.variant.tl4 |= tl4;
            config.variant.dpd |= dpd;
            check_firmware(&config)
        }
        Command::Region { country_code } => {
            let region = regulatory::region_for(&country_code);
            println!("{} -> {} (index {})", country_code, region, region.index());
            Ok(())
        }
        Command::PowerLimit {
            file,
            country,
            channel,
            freq,
            bw,
        } => {
            if file.is_some() {
                config.powerlimit_path = file;
            }
            if let Some(country) = country {
                config.country_code = country;
            }
            query_power_limit(&config, channel, freq, bw)
        }
        Command::Userconfig { file } => {
            if file.is_some() {
                config.userconfig_path = file;
            }
            report_userconfig(&config)
        }
        Command::Simulate { cycles } => simulate(&config, cycles),
        Command::InitConfig { path } => {
            config.save_to_file(&path)?;
            info!(path = %path.display(), "Configuration written");
            Ok(())
        }
    }
}

fn check_firmware(config: &PlatformConfig) -> Result<()> {
    let store = DirectoryStore::new(&config.firmware_dir);
    let artifacts = firmware::resolve(config.mode, &config.variant);

    println!("Firmware set for {} in {}:", config.mode, config.firmware_dir.display());
    for artifact in &artifacts {
        let found = artifact.candidates.iter().find(|name| store.contains(name));
        println!(
            "  {:<14} {:<40} {}",
            artifact.kind.to_string(),
            artifact.candidates.join(" | "),
            match (found, artifact.mandatory) {
                (Some(name), _) => format!("found ({})", name),
                (None, true) => "MISSING".to_string(),
                (None, false) => "absent (optional)".to_string(),
            }
        );
    }

    let resolved = firmware::validate_presence(&artifacts, &store)?;
    info!(count = resolved.len(), "Firmware set complete");
    Ok(())
}

fn query_power_limit(
    config: &PlatformConfig,
    channel: Option<u16>,
    freq: Option<u16>,
    bw: u16,
) -> Result<()> {
    let Some((table, report)) = config.load_power_limits()? else {
        bail!("No power-limit file given (use --file or powerlimit_path)");
    };
    if report.has_warnings() {
        warn!(count = report.warnings.len(), "Power-limit file has skipped rows");
    }
    if let Err(e) = table.verify_channel_frequency_agreement() {
        warn!("Channel/frequency lookups disagree: {}", e);
    }

    let bw = Bandwidth::from_mhz(bw).with_context(|| format!("Unsupported bandwidth {} MHz", bw))?;
    let region = config.region();

    let (band, channel, raw) = match (channel, freq) {
        (Some(ch), _) => {
            let band = Band::of_channel(ch);
            (band, ch, table.channel_power_limit(ch, region.index(), bw))
        }
        (None, Some(freq)) => {
            let band = if freq < 5000 { Band::Band2G4 } else { Band::Band5G };
            let ch = regulatory::freq_to_channel(band, freq)
                .with_context(|| format!("{} MHz is not a channel center frequency", freq))?;
            (band, ch, table.by_frequency(band, freq, bw, region.index()))
        }
        (None, None) => bail!("Give --channel or --freq"),
    };

    let freq = channel_to_freq(band, channel).unwrap_or_default();
    println!(
        "{} {} channel {} ({} MHz) @ {}: {} (raw {})",
        config.country_code,
        region,
        channel,
        freq,
        bw,
        PowerLimit::from(raw),
        raw
    );
    Ok(())
}

fn report_userconfig(config: &PlatformConfig) -> Result<()> {
    let Some((userconfig, report)) = config.load_user_config()? else {
        bail!("No user configuration file given");
    };
    print_userconfig(&userconfig);
    println!("{} entries applied, {} skipped", report.applied, report.warnings.len());
    for warning in &report.warnings {
        println!("  {}", warning);
    }
    Ok(())
}

fn print_userconfig(userconfig: &UserConfig) {
    match userconfig.tx_power_level() {
        Some(level) => println!(
            "txpwr_lvl: v{} (populated: {:?}), enabled: {}",
            level.version(),
            userconfig.tx_power_levels().populated_versions(),
            level.is_enabled()
        ),
        None => println!("txpwr_lvl: not set"),
    }
    match userconfig.tx_power_offset2x() {
        Some(ofst) => println!("txpwr_ofst2x: v{}", ofst.version()),
        None => println!("txpwr_ofst2x: not set"),
    }
    let loss = userconfig.tx_power_loss();
    println!("txpwr_loss: {} dB", loss.effective_loss());
    let xtal = userconfig.crystal_cap();
    println!(
        "xtal_cap: enable={} cap={} fine={}",
        xtal.enable, xtal.xtal_cap, xtal.xtal_cap_fine
    );
}

fn simulate(config: &PlatformConfig, cycles: u32) -> Result<()> {
    let store = DirectoryStore::new(&config.firmware_dir);
    let bus = MockBus::new().with_config_registers(&[0x0100, 0x0104, 0x0108]);
    let selection = FirmwareSelection::from(config);
    info!(
        mode = %selection.mode,
        variant = ?selection.variant,
        "Simulating bring-up"
    );

    let mut platform = PlatformController::init(bus, store, selection)?;
    platform.enable()?;
    for _ in 0..cycles {
        platform.disable()?;
        platform.enable()?;
    }
    platform.disable()?;
    if let Some(blob) = platform.export_snapshot() {
        info!(bytes = blob.len(), "Config snapshot held across disable");
    }
    platform.deinit()?;
    info!(state = %platform.state(), "Simulation finished");
    Ok(())
}
