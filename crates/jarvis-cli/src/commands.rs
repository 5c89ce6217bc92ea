use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "jarvis")]
#[command(about = "Watches for idle memory hogs and oversized files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Look for idle processes holding a lot of memory
    Processes {
        /// Memory limit in MB (at least 50); defaults to scan.process_limit_mb
        #[arg(long)]
        limit_mb: Option<u64>,
    },
    /// Look for large files in the configured folders
    Files {
        /// Size limit in MB (at least 100); defaults to scan.file_limit_mb
        #[arg(long)]
        limit_mb: Option<u64>,
    },
    /// Run the process scan and then the file scan
    All,
    /// Run both scans on their intervals until Ctrl-C
    Schedule,
    /// Serve system status, logs, scans and job status over HTTP
    Serve,
    /// Print the persisted scheduler job status
    Jobs,
    /// Print configuration values
    PrintConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_parses_to_none() {
        let cli = Cli::try_parse_from(["jarvis"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_limit_flag_is_optional() {
        let cli = Cli::try_parse_from(["jarvis", "files", "--limit-mb", "2000"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Files { limit_mb: Some(2000) }));

        let cli = Cli::try_parse_from(["jarvis", "processes"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Processes { limit_mb: None }));
    }

    #[test]
    fn test_rejects_non_numeric_limit() {
        assert!(Cli::try_parse_from(["jarvis", "processes", "--limit-mb", "lots"]).is_err());
    }

    #[test]
    fn test_kebab_case_subcommands() {
        let cli = Cli::try_parse_from(["jarvis", "print-config"]).unwrap();
        assert_eq!(cli.command, Some(Commands::PrintConfig));
    }
}
