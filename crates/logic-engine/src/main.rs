//! 逻辑规则引擎命令行
//!
//! 从 JSON 文件读取规则树和事实数据，输出求值结果或依赖图。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logic_engine::{Direction, EngineConfig, RuleEngine, observability};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "logic-engine", version, about = "Evaluate JSON logic rule trees")]
struct Cli {
    /// 规则树 JSON 文件
    #[arg(long)]
    rules: PathBuf,

    /// 事实数据 JSON 文件
    #[arg(long)]
    facts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 对单条规则求值
    Run { path: String },
    /// 列出传递依赖闭包
    Propagate {
        path: String,
        #[arg(long)]
        direction: Option<Direction>,
    },
    /// 对规则及其传递依赖依次求值
    Drill {
        path: String,
        #[arg(long)]
        direction: Option<Direction>,
    },
    /// 输出依赖图
    Graph,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        EngineConfig::default()
    });
    observability::init(&config.observability)?;

    let rules = read_json(&cli.rules)?;
    let engine = RuleEngine::with_config(rules, &config);
    if let Some(path) = &cli.facts {
        engine.use_facts(read_json(path)?);
        debug!(facts = %path.display(), "事实数据已加载");
    }

    match cli.command {
        Command::Run { path } => {
            info!(path = %path, "run");
            print_json(&engine.run(&path, None)?)
        }
        Command::Propagate { path, direction } => {
            let direction = direction.unwrap_or(config.default_direction);
            info!(path = %path, %direction, "propagate");
            print_json(&engine.propagate(&path, direction)?)
        }
        Command::Drill { path, direction } => {
            let direction = direction.unwrap_or(config.default_direction);
            info!(path = %path, %direction, "drill");
            print_json(&engine.drill(&path, None, direction)?)
        }
        Command::Graph => print_json(engine.graph()),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
