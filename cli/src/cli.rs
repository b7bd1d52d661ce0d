use clap::Parser;
use std::path::PathBuf;

/// Terminal assistant for New-Health Pharmacy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// One-shot prompt to send to the assistant
    #[arg(index = 1)]
    pub prompt: Option<String>,

    /// Enter interactive chat mode
    #[arg(short, long, default_value_t = false)]
    pub interactive: bool,

    /// Start in deep-analysis mode (pharmacy tools, higher-capability model)
    #[arg(long, default_value_t = false)]
    pub deep: bool,

    /// Start a realtime voice call, reading raw mono PCM16 at 16 kHz from
    /// stdin
    #[arg(long, default_value_t = false)]
    pub voice: bool,

    /// Print the pharmacy marketing content and exit
    #[arg(long, default_value_t = false)]
    pub content: bool,

    /// Erase the persisted conversation before starting
    #[arg(long, default_value_t = false)]
    pub fresh: bool,

    /// Path to an alternate config file
    #[arg(long, env = "NEWHEALTH_CONFIG")]
    pub config: Option<PathBuf>,
}
