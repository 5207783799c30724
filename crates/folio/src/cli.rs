//! CLI command definitions using `clap`

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command as ClapCommand};

pub fn build_cli() -> ClapCommand {
    ClapCommand::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-document session orchestration from the command line")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd_documents())
        .subcommand(cmd_mode())
        .subcommand(cmd_bundle())
}

pub fn after_help_text(examples: &[&str]) -> String {
    let mut text = String::from("EXAMPLES:\n");
    for example in examples {
        text.push_str("  ");
        text.push_str(example);
        text.push('\n');
    }
    text
}

pub fn cmd_documents() -> ClapCommand {
    ClapCommand::new("documents")
        .about("Resolve a session config into its canonical documents")
        .arg(
            Arg::new("config")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Session config (.toml or .json)"),
        )
        .after_help(after_help_text(&[
            "folio documents session.toml     Print the resolved documents as JSON",
        ]))
}

pub fn cmd_mode() -> ClapCommand {
    ClapCommand::new("mode")
        .about("Resolve the document mode a role may enter")
        .arg(
            Arg::new("role")
                .long("role")
                .required(true)
                .value_parser(["editor", "suggester", "viewer"])
                .ignore_case(true)
                .help("Role of the current user"),
        )
        .arg(
            Arg::new("request")
                .long("request")
                .required(true)
                .value_parser(["editing", "suggesting", "viewing"])
                .ignore_case(true)
                .help("Requested document mode"),
        )
        .after_help(after_help_text(&[
            "folio mode --role viewer --request editing      Prints `viewing`",
        ]))
}

pub fn cmd_bundle() -> ClapCommand {
    ClapCommand::new("bundle")
        .about("Export files through a session into a single file or zip bundle")
        .arg(
            Arg::new("name")
                .long("name")
                .help("Base name of the artifact (defaults to the session title)"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory the artifact is written into"),
        )
        .arg(
            Arg::new("clean")
                .long("clean")
                .action(ArgAction::SetTrue)
                .help("Export without comments"),
        )
        .arg(
            Arg::new("files")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf))
                .help("DOCX files become documents; anything else is attached as-is"),
        )
        .after_help(after_help_text(&[
            "folio bundle --out dist contract.docx                 Writes dist/Document.docx",
            "folio bundle --name Deal --out dist a.docx b.docx     Writes dist/Deal.zip",
            "folio bundle --out dist terms.pdf                     Writes dist/Document.pdf",
        ]))
}
