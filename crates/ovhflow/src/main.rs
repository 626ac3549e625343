mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ovhflow")]
#[command(about = "OVH パブリッククラウドのリソースを作成・確認・削除する", long_about = None)]
struct Cli {
    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    /// state を置くプロジェクトディレクトリ
    #[arg(
        short = 'C',
        long = "project-dir",
        env = "OVHFLOW_PROJECT_DIR",
        default_value = ".",
        global = true
    )]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// リソースを作成し、完了するまで待機
    Create {
        /// リソースタイプ (例: ovh_cloud_instance)
        resource_type: String,
        /// state 上の名前
        name: String,
        /// 属性 (key=value は文字列、key:=value は JSON の数値・真偽値)
        #[arg(short = 'a', long = "attr")]
        attributes: Vec<String>,
    },
    /// リモートの状態を取得して state を更新
    Read {
        /// リソースタイプ
        resource_type: String,
        /// state 上の名前
        name: String,
    },
    /// リソースを削除
    Delete {
        /// リソースタイプ
        resource_type: String,
        /// state 上の名前
        name: String,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 管理中のリソースを一覧表示
    List {
        /// リソースタイプで絞り込む
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,
    },
    /// 対応しているリソースタイプを表示
    Types,
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("ovhflow {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Types => {
            println!("{}", "対応リソースタイプ:".bold());
            for resource_type in ovhflow_cloud_ovh::OvhProvider::resource_types() {
                println!("  {}", resource_type.cyan());
            }
        }
        Commands::List { resource_type } => {
            commands::list::handle(&cli.project_dir, resource_type.as_deref()).await?;
        }
        Commands::Create {
            resource_type,
            name,
            attributes,
        } => {
            commands::create::handle(&cli.project_dir, &resource_type, &name, &attributes).await?;
        }
        Commands::Read {
            resource_type,
            name,
        } => {
            commands::read::handle(&cli.project_dir, &resource_type, &name).await?;
        }
        Commands::Delete {
            resource_type,
            name,
            yes,
        } => {
            commands::delete::handle(&cli.project_dir, &resource_type, &name, yes).await?;
        }
    }

    Ok(())
}
