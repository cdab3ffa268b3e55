//! Command line front end for callable-traits.
//!
//! One-shot mode evaluates a single query and prints the answer:
//!
//! ```text
//! callable-traits query remove_at 'int(foo::*)(N<0>, N<1>, N<2>)' 1
//! callable-traits --decls foo.hpp query can_invoke foo 'int, int&'
//! ```
//!
//! Serve mode reads JSON `Request`s from stdin, one per line, and writes one
//! JSON `Response` line for each.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use callable_traits_query::{
    ClassTable, QueryResult, execute_query, handle_json_line, parse_declarations, parse_query,
};

/// CLI arguments for callable-traits
#[derive(Parser, Debug)]
#[command(name = "callable-traits")]
#[command(about = "Classify, query and transform C++ callable types")]
struct Args {
    /// Class declarations the queried types refer to: C++ source, or a JSON
    /// class table if the file ends in `.json`
    #[arg(short, long, global = true)]
    decls: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a single query
    Query {
        /// Query, predicate or transformation name, e.g. `arity`,
        /// `is_noexcept` or `remove_at`
        query: String,

        /// The callable type, in C++ syntax
        ty: String,

        /// Extra arguments: an index, argument types, or transformation
        /// arguments
        args: Vec<String>,

        /// Print the JSON result instead of the bare answer
        #[arg(long)]
        json: bool,
    },

    /// Answer JSON requests read from stdin, one per line
    Serve,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let classes = match &args.decls {
        Some(path) => load_classes(path)?,
        None => ClassTable::new(),
    };
    log::debug!("{} classes declared", classes.len());

    match args.command {
        Command::Query {
            query,
            ty,
            args,
            json,
        } => run_query(&query, &ty, &args, json, &classes),
        Command::Serve => serve(&classes),
    }
}

fn load_classes(path: &Path) -> Result<ClassTable> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read declarations from {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    parse_classes(&source, is_json).with_context(|| format!("in {}", path.display()))
}

fn parse_classes(source: &str, is_json: bool) -> Result<ClassTable> {
    if is_json {
        Ok(serde_json::from_str(source)?)
    } else {
        Ok(parse_declarations(source)?)
    }
}

fn run_query(name: &str, ty: &str, args: &[String], json: bool, classes: &ClassTable) -> Result<()> {
    let query = parse_query(name, ty, args)?;
    log::debug!("executing {query:?}");

    let result = execute_query(&query, classes);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result {
        QueryResult::Success { data } => {
            println!("{data}");
            Ok(())
        }
        QueryResult::Error { message } => bail!(message),
    }
}

fn serve(classes: &ClassTable) -> Result<()> {
    log::info!("serving requests on stdin");
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_json_line(&line, classes)?;
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }

    log::info!("stdin closed, exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_query_command() {
        let args = Args::parse_from([
            "callable-traits",
            "--decls",
            "foo.hpp",
            "query",
            "remove_at",
            "void(int, char)",
            "1",
        ]);
        assert_eq!(args.decls, Some(PathBuf::from("foo.hpp")));
        match args.command {
            Command::Query {
                query, ty, args, json,
            } => {
                assert_eq!(query, "remove_at");
                assert_eq!(ty, "void(int, char)");
                assert_eq!(args, vec!["1".to_string()]);
                assert!(!json);
            }
            Command::Serve => panic!("expected a query command"),
        }
    }

    #[test]
    fn test_parse_classes() {
        let cpp = parse_classes("struct foo { void operator()(int) const; };", false).unwrap();
        assert!(cpp.get("foo").is_some());

        let json = serde_json::to_string(&cpp).unwrap();
        assert_eq!(parse_classes(&json, true).unwrap(), cpp);

        assert!(parse_classes("struct foo { void operator()(int) const;", false).is_err());
        assert!(parse_classes("{", true).is_err());
    }

    #[test]
    fn test_run_query_reports_failures() {
        let classes = ClassTable::new();
        assert!(run_query("arity", "void(int)", &[], false, &classes).is_ok());
        assert!(run_query("arity", "int", &[], false, &classes).is_err());
        assert!(run_query("arity", "int", &[], true, &classes).is_ok());
        assert!(run_query("no_such_query", "int", &[], false, &classes).is_err());
    }
}
