use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Find BibTeX for papers using Crossref and arXiv", long_about = None)]
pub struct Cli {
    /// Configuration file [default: $PDFLU_CONFIG or ~/.config/pdflu/pdflu.toml]
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print detailed output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print debug information
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up the BibTeX entry of a PDF file or a query
    Lookup(LookupArgs),
    /// Print the metadata extracted from a PDF file without searching
    Metadata {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// PDF file, or the search text when `--query` is given
    #[arg(value_name = "FILE_OR_QUERY")]
    pub target: String,

    /// Treat the argument as a query (free text, DOI or arXiv ID) instead of a file
    #[arg(short, long)]
    pub query: bool,

    /// Choose among the results interactively
    #[arg(short, long)]
    pub interactive: bool,

    /// Do not copy the entry to the clipboard even if the configuration asks for it
    #[arg(long)]
    pub no_clipboard: bool,
}

impl Cli {
    /// Default log filter implied by the flags.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_flags() {
        let cli = Cli::try_parse_from(["pdflu", "-v", "lookup", "-q", "-i", "attention is all you need"])
            .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.log_level(), "info");
        match cli.command {
            Command::Lookup(args) => {
                assert_eq!(args.target, "attention is all you need");
                assert!(args.query && args.interactive && !args.no_clipboard);
            }
            other => panic!("expected lookup, got {other:?}"),
        }
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["pdflu", "metadata", "paper.pdf", "--debug", "-c", "x.toml"])
            .expect("parse");
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Metadata { .. }));
    }

    #[test]
    fn any_target_string_is_accepted() {
        proptest::proptest!(|(s in "[A-Za-z0-9._/-]{1,32}")| {
            proptest::prop_assume!(!s.starts_with('-'));
            let cli = Cli::try_parse_from(["pdflu", "lookup", s.as_str()]).expect("parse");
            match cli.command {
                Command::Lookup(args) => proptest::prop_assert_eq!(args.target, s),
                Command::Metadata { .. } => proptest::prop_assert!(false, "wrong subcommand"),
            }
        })
    }
}
