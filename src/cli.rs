//! The command-line interface for `micac`.
//!
//! Usage (as with any other [`argh`] interface) involves first invoking
//! [`argh::from_env()`], and then processing the resulting [`Cli`] value.

#![allow(clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use anyhow::Context as _;
use argh::FromArgs;

use crate::compiler::Context;
use crate::node::Node;

/// A compiler and rewriting engine for the Mica language.
#[derive(Debug, FromArgs)]
pub struct Cli {
    #[argh(subcommand)]
    cmd: CliSubCommand,
}

impl Cli {
    /// Consumes `self` and processes the given subcommand.
    pub fn handle(self) -> anyhow::Result<()> {
        match self.cmd {
            CliSubCommand::Run(args) => args.run(),
            CliSubCommand::Eval(args) => args.run(),
        }
    }
}

/// The set of distinct subcommands available to be passed to the [`Cli`].
#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum CliSubCommand {
    Run(Run),
    Eval(Eval),
}

/// Compiles a .mica file and prints the simplified value of each statement.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct Run {
    /// a path to a .mica file
    #[argh(positional)]
    file: PathBuf,

    /// print every statement's value, not just the non-void ones
    #[argh(switch, short = 'v')]
    verbose: bool,
}

impl Run {
    fn run(self) -> anyhow::Result<()> {
        let source = std::fs::read_to_string(&self.file)
            .with_context(|| format!("could not read {}", self.file.display()))?;

        let mut ctx = Context::new();
        let statements = ctx
            .compile_document(&source, None)
            .context("compilation failed")?;

        for statement in &statements {
            let value = ctx
                .simplify(&statement.node)
                .with_context(|| format!("evaluation failed on line {}", statement.line))?;
            if self.verbose || value != Node::Void {
                println!("{}", ctx.stringify(&value));
            }
        }
        Ok(())
    }
}

/// Compiles a single expression and prints its simplified form.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "eval")]
struct Eval {
    /// the expression to evaluate
    #[argh(positional)]
    expr: String,
}

impl Eval {
    fn run(self) -> anyhow::Result<()> {
        let mut ctx = Context::new();
        let node = ctx.compile(&self.expr).context("compilation failed")?;
        let value = ctx.simplify(&node).context("simplification failed")?;
        println!("{}", ctx.stringify(&value));
        Ok(())
    }
}
