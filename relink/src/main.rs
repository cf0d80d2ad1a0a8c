use commands::command_argument_builder;
use relink::handlers::{
    handle_audit, handle_build, handle_discover, handle_placeholders, handle_recover,
    handle_snapshots,
};
use relink_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("audit", primary_command)) => handle_audit(primary_command).await,
        Some(("placeholders", primary_command)) => handle_placeholders(primary_command).await,
        Some(("recover", primary_command)) => handle_recover(primary_command).await,
        Some(("discover", primary_command)) => handle_discover(primary_command).await,
        Some(("build", primary_command)) => handle_build(primary_command),
        Some(("snapshots", primary_command)) => handle_snapshots(primary_command),
        // No subcommand provided, just show the banner
        None => {}
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
