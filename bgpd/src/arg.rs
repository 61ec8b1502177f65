//! Command line arguments parsing.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "A BGP-4 speaker daemon")]
pub struct Bgpd {
    /// Path to the YAML server/peer configuration file
    #[arg(short = 'c', long, default_value = "bgpd.yaml")]
    pub config: PathBuf,
    /// Verbose mode: log at debug level instead of info
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
