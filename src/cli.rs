//! Command line interface for the demo binary.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "galleria", version, about = "Adaptive priority asset loader")]
pub struct Cli {
    /// Directory to load assets from
    pub dir: PathBuf,

    /// Glob pattern for identifiers, relative to the directory
    #[arg(short, long, default_value = "**/*.jpg")]
    pub pattern: String,

    /// Identifiers to load at High priority before background warming
    #[arg(long = "hot", value_name = "ID")]
    pub hot: Vec<String>,

    /// Initial in-flight budget (overrides the config file)
    #[arg(short, long)]
    pub concurrent: Option<usize>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable the adaptive budget controller
    #[arg(long)]
    pub no_adaptive: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: argument parsing
    /// Validates: defaults and verbosity mapping
    #[test]
    fn test_parse_defaults() {
        let cli = Cli::parse_from(["galleria", "/tmp/pics"]);
        assert_eq!(cli.dir, PathBuf::from("/tmp/pics"));
        assert_eq!(cli.pattern, "**/*.jpg");
        assert!(cli.hot.is_empty());
        assert_eq!(cli.log_level(), LevelFilter::Info);

        let cli = Cli::parse_from(["galleria", "/tmp/pics", "-vv", "--hot", "a.jpg"]);
        assert_eq!(cli.log_level(), LevelFilter::Trace);
        assert_eq!(cli.hot, vec!["a.jpg".to_string()]);
    }
}
