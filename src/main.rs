//! hsage 命令行入口
//!
//! 加载配置 → 初始化日志 → 安装信号处理 → 组装工作流 → 执行子命令并输出表格或 JSON。

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hsage::commands;
use hsage::config::load_config;
use hsage::core::{AppBuilder, ShutdownManager};
use hsage::observability;
use hsage::ui::terminal_width;
use hsage::{StatisticsWorkflow, WorkflowOutcome};

#[derive(Parser)]
#[command(name = "hsage", about = "Statistics assistant grounded in Wikipedia articles")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra config file (overrides config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the structured result as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the statistics knowledge base
    Query {
        q: String,
        /// Number of chunks to return
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Create one worked example for a test
    MakeExample {
        test_name: String,
        #[arg(long)]
        situation: Option<String>,
    },
    /// Create several examples in parallel and keep the first ones to finish
    MakeExamples {
        test_name: String,
        #[arg(long)]
        situation: Option<String>,
    },
    /// Recommend statistical tests for a situation
    FindBestTest { prompt: String },
    /// Explain a statistical concept
    ExplainThis { query: String },
    /// Route a free-form question to the right operation
    Ask { query: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.clone()).context("Failed to load config")?;
    let _telemetry = observability::init(&config.logging, cli.verbose);

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let workflow = AppBuilder::new(config)
        .build(shutdown.token())
        .context("Failed to build workflow")?;

    let outcome = match run_command(&workflow, cli.command).await {
        Ok(outcome) => outcome,
        // 被信号中断时报告错误并以信号退出码结束
        Err(e) => match shutdown.reason() {
            Some(reason) => {
                eprintln!("Error: {e:#}");
                return Ok(ExitCode::from(reason.exit_code()));
            }
            None => return Err(e),
        },
    };

    let stdout = std::io::stdout();
    let ansi = stdout.is_terminal();
    let text = commands::format_outcome(&outcome, cli.json, terminal_width(), ansi)?;
    print!("{text}");
    Ok(shutdown
        .reason()
        .map_or(ExitCode::SUCCESS, |r| ExitCode::from(r.exit_code())))
}

async fn run_command(workflow: &StatisticsWorkflow, command: Commands) -> Result<WorkflowOutcome> {
    let outcome = match command {
        Commands::Query { q, top_k } => commands::query(workflow, &q, top_k)
            .await
            .map(WorkflowOutcome::Matches)
            .context("query failed")?,
        Commands::MakeExample { test_name, situation } => {
            commands::make_example(workflow, &test_name, situation.as_deref())
                .await
                .map(WorkflowOutcome::Example)
                .context("make-example failed")?
        }
        Commands::MakeExamples { test_name, situation } => {
            commands::make_examples(workflow, &test_name, situation.as_deref())
                .await
                .map(WorkflowOutcome::Examples)
                .context("make-examples failed")?
        }
        Commands::FindBestTest { prompt } => commands::find_best_test(workflow, &prompt)
            .await
            .map(WorkflowOutcome::Tests)
            .context("find-best-test failed")?,
        Commands::ExplainThis { query } => commands::explain_this(workflow, &query)
            .await
            .map(WorkflowOutcome::Explanation)
            .context("explain-this failed")?,
        Commands::Ask { query } => commands::ask(workflow, &query).await.context("ask failed")?,
    };
    Ok(outcome)
}
