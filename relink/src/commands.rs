use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

fn out_dir_arg() -> clap::Arg {
    arg!(-o --"out-dir" <DIR>)
        .required(false)
        .help("Working directory holding the audit/ and data/ artifacts")
        .default_value(".")
}

fn concurrency_arg(default: &'static str) -> clap::Arg {
    arg!(-c --"concurrency" <NUM>)
        .required(false)
        .help("Maximum number of requests in flight")
        .value_parser(clap::value_parser!(usize))
        .default_value(default)
}

fn timeout_arg(default: &'static str) -> clap::Arg {
    arg!(--"timeout" <SECS>)
        .required(false)
        .help("Total time budget for a single request, in seconds")
        .value_parser(clap::value_parser!(u64))
        .default_value(default)
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("relink")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("relink")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("audit")
                .about("Probe every catalog link and classify it as verified or invalid")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("Catalog to audit (CSV spreadsheet export or JSON/D1 export)"),
                )
                .arg(out_dir_arg())
                .arg(concurrency_arg("80"))
                .arg(timeout_arg("20")),
        )
        .subcommand(
            command!("placeholders")
                .about(
                    "Fetch the start of every verified page and demote parking or placeholder \
                pages",
                )
                .arg(out_dir_arg())
                .arg(concurrency_arg("80"))
                .arg(timeout_arg("22"))
                .arg(
                    arg!(--"all")
                        .required(false)
                        .help("Also inspect rows the audit marked invalid")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("recover")
                .about("Search for replacement homepages of dead links")
                .arg(out_dir_arg())
                .arg(
                    arg!(-w --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async workers in the recovery pool")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"candidates" <NUM>)
                        .required(false)
                        .help("Search results considered per dead link")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"min-confidence" <SCORE>)
                        .required(false)
                        .help("Minimum confidence for accepting a replacement")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.62"),
                )
                .arg(
                    arg!(--"max-rows" <NUM>)
                        .required(false)
                        .help("Only attempt the first N dead links (0 means all)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                ),
        )
        .subcommand(
            command!("discover")
                .about("Harvest new tools from curated markdown listings and verify their homepages")
                .arg(out_dir_arg())
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Catalog whose domains are excluded (default: audit/tools_with_audit.csv)"),
                )
                .arg(
                    arg!(-s --"source" <URL>)
                        .required(false)
                        .help("Raw markdown listing to harvest; repeat for several (default: built-in lists)")
                        .value_parser(clap::value_parser!(Url))
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"max-checks" <NUM>)
                        .required(false)
                        .help("Highest-scoring candidates to probe")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("900"),
                )
                .arg(
                    arg!(--"max-add" <NUM>)
                        .required(false)
                        .help("Maximum number of verified tools to keep")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("220"),
                )
                .arg(concurrency_arg("60")),
        )
        .subcommand(
            command!("build")
                .about("Reconcile audited, recovered and discovered tools into the canonical dataset")
                .arg(out_dir_arg())
                .arg(
                    arg!(--"drop-mismatch-score" <SCORE>)
                        .required(false)
                        .help(
                            "Drop legacy rows whose name matches their domain at or below this \
                        score",
                        )
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.0"),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Record the dataset as a snapshot in this SQLite database"),
                )
                .arg(
                    arg!(--"fresh")
                        .required(false)
                        .requires("db")
                        .help("Delete the snapshot database before recording"),
                ),
        )
        .subcommand(
            command!("snapshots")
                .about("List the dataset snapshots recorded in a SQLite database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the snapshot database")
                        .default_value("~/.config/relink/relink.db"),
                )
                .arg(
                    arg!(--"show" <ID>)
                        .required(false)
                        .help("Print the tools of one snapshot ('latest' for the newest)"),
                ),
        )
}
