//! Tests for config, completions and man.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

#[test]
fn cli_parse_config() {
    match parse(&["rivulet", "config"]) {
        CliCommand::Config => {}
        _ => panic!("expected Config"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["rivulet", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Bash),
        _ => panic!("expected Completions"),
    }
    assert!(Cli::try_parse_from(["rivulet", "completions", "cmd.exe"]).is_err());
}

#[test]
fn cli_parse_man() {
    match parse(&["rivulet", "man"]) {
        CliCommand::Man => {}
        _ => panic!("expected Man"),
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn completions_mention_subcommands() {
    let mut buf = Vec::new();
    clap_complete::generate(Shell::Bash, &mut Cli::command(), "rivulet", &mut buf);
    let script = String::from_utf8(buf).unwrap();
    assert!(script.contains("tail"));
    assert!(script.contains("completions"));
}
