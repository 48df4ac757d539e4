use clap::{Args, Parser, Subcommand};
use eight_driver::pipeline::{execute_build_pipeline, execute_inspect_pipeline, PipelineOptions};
use eight_driver::query::EmitQuery;
use eight_mir::min_function::DEFAULT_TARGET_TRIPLE;
use eight_mir::MirTargetLayout;
use env_logger::Env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct AppArgs {
    #[command(subcommand)]
    command: AppCommand,
}

#[derive(Subcommand)]
enum AppCommand {
    /// Build the `min` module, verify it, and write its binary encoding to a file.
    Build {
        /// The file to write the module to.
        output: PathBuf,

        /// Should the textual MIR be emitted?
        #[arg(long, default_value = "false")]
        emit_mir: bool,

        #[command(flatten)]
        emit: EmitArgs,

        /// The target layout descriptor of the module.
        #[arg(long, env = "EIGHT_TARGET_LAYOUT", default_value = "e-p:64:64-S128")]
        target_layout: String,

        /// The target triple recorded in the module.
        #[arg(long, default_value = DEFAULT_TARGET_TRIPLE)]
        target_triple: String,
    },
    /// Read a module file, verify it, and print its textual MIR.
    Inspect {
        /// The module file to read.
        input: PathBuf,

        #[command(flatten)]
        emit: EmitArgs,
    },
}

#[derive(Args)]
struct EmitArgs {
    /// Should the module be dumped as RON?
    #[arg(long, default_value = "false")]
    emit_ron: bool,

    /// Emission queries to specify which functions should be emitted.
    #[arg(long)]
    emit_query: Vec<String>,
}

fn main() -> miette::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = AppArgs::parse();

    match args.command {
        AppCommand::Build {
            output,
            emit_mir,
            emit,
            target_layout,
            target_triple,
        } => {
            let options = PipelineOptions {
                emit_mir,
                emit_ron: emit.emit_ron,
                queries: EmitQuery::from_queries(&emit.emit_query)?,
                target_layout: target_layout.parse::<MirTargetLayout>()?,
                target_triple,
            };
            execute_build_pipeline(options, &output)?;
        }
        AppCommand::Inspect { input, emit } => {
            let options = PipelineOptions {
                emit_mir: true,
                emit_ron: emit.emit_ron,
                queries: EmitQuery::from_queries(&emit.emit_query)?,
                ..PipelineOptions::default()
            };
            execute_inspect_pipeline(options, &input)?;
        }
    }
    Ok(())
}
