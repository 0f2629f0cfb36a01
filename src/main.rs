//! # AI Gateway 主程序

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use ai_gateway::{
    AppContext, GatewayError, GatewayServer, Result, SecurityConfig,
    auth::{UserRole, service::NewUser},
    cipher::SecretCipher,
    config::load_config,
    database::{init_database, run_migrations},
    error::Context,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    provider::ProviderKind,
};

/// Session-aware AI provider gateway
#[derive(Parser, Debug)]
#[command(name = "ai-gateway", version, about)]
struct Cli {
    /// 日志级别（`RUST_LOG` 优先）
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// 配置文件路径，默认 config/config.{RUST_ENV}.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 创建用户
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// `admin` 或 `user`
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// 注册服务商并保存其默认密钥
    AddProvider {
        #[arg(long)]
        name: String,
        /// gemini / mistral / openai；省略时按名称推断
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        default_secret: String,
    },
    /// 生成 SECRET_ENCRYPTION_KEY（64 位十六进制）
    GenerateKey,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "startup_failed",
            format!("启动失败: {e}")
        );
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Command::Serve);
    if matches!(command, Command::GenerateKey) {
        println!("{}", SecretCipher::generate_key());
        return Ok(());
    }

    let config = Arc::new(load_config(cli.config.as_deref())?);
    let security = SecurityConfig::from_env()?;
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Config,
        "config_loaded",
        format!("配置加载完成 listen={}", config.server.listen_addr())
    );

    let db = init_database(&config.database)
        .await
        .context("数据库连接失败")?;
    run_migrations(&db).await.context("数据库迁移失败")?;
    let context = Arc::new(AppContext::with_database(config, &security, Arc::new(db))?);

    match command {
        Command::Serve | Command::GenerateKey => GatewayServer::new(context).serve().await,
        Command::AddUser {
            name,
            email,
            password,
            role,
        } => {
            let role = UserRole::parse(&role).ok_or_else(|| {
                GatewayError::validation_field(format!("unknown role: {role}"), "role")
            })?;
            let user = context
                .auth
                .register(NewUser {
                    name,
                    email,
                    password,
                    role,
                })
                .await?;
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Main,
                "add_user",
                format!("✅ 用户已创建 id={} email={} role={}", user.id, user.email, user.role)
            );
            Ok(())
        }
        Command::AddProvider {
            name,
            kind,
            default_secret,
        } => {
            let kind = match kind {
                Some(kind) => kind.parse::<ProviderKind>()?,
                None => ProviderKind::parse(&name).ok_or_else(|| {
                    GatewayError::validation_field("--kind is required for this name", "kind")
                })?,
            };
            let provider = context
                .providers
                .register(&name, kind, &default_secret, "system")
                .await?;
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Main,
                "add_provider",
                format!("✅ 服务商已注册 id={} name={}", provider.id, provider.name)
            );
            Ok(())
        }
    }
}
