//! 生产监控看板命令行入口

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use plant_monitor::{
    auth::Claims,
    client::ApiClient,
    config::AppConfig,
    models::action_plan::ActionPlan,
    services::{EscalationRule, RefreshOutcome, RefreshTimer, RefreshTrigger, SessionManager},
    telemetry,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "plant-monitor", version, about = "Production dashboard session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 登录并保存令牌
    Login {
        #[arg(short, long)]
        username: String,
        /// 未提供时读取 PLANT_PASSWORD
        #[arg(short, long, env = "PLANT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// 清除本地会话
    Logout,
    /// 显示会话状态
    Status,
    /// 立即刷新访问令牌
    Refresh,
    /// 运行主动刷新定时器直到 Ctrl+C
    Watch,
    /// 授权 GET 请求并输出 JSON
    Get {
        path: String,
    },
    /// 按升级等级列出未关闭的行动计划
    Plans {
        #[arg(long, default_value = "/api/action-plans/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 按优先级加载：.env.local > .env
    if let Ok(env) = std::env::var("PLANT_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    let cli = Cli::parse();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config.logging);

    let session = Arc::new(SessionManager::from_config(&config)?);

    match cli.command {
        Command::Login { username, password } => {
            let identity = session.login(&username, &password).await?;
            match identity {
                Some(identity) => println!("{}", serde_json::to_string_pretty(&identity)?),
                None => println!("Logged in as {}", username),
            }
        }
        Command::Logout => {
            session.logout()?;
            println!("Logged out");
        }
        Command::Status => print_status(&session)?,
        Command::Refresh => {
            let observed = session.access_token()?;
            session
                .refresh(RefreshTrigger::Proactive, observed.as_deref())
                .await?;
            println!("Access token refreshed");
        }
        Command::Watch => {
            if session.refresh_if_expiring(Utc::now()).await? == RefreshOutcome::Skipped {
                println!("Not logged in");
                return Ok(());
            }
            let timer = RefreshTimer::spawn(session.clone(), config.session.refresh_interval());
            tracing::info!(
                interval_secs = config.session.refresh_interval_secs,
                threshold_secs = config.session.refresh_threshold_secs,
                "Watching session, press Ctrl+C to stop"
            );
            tokio::signal::ctrl_c().await?;
            timer.stop();
        }
        Command::Get { path } => {
            let client = ApiClient::new(&config.api, session.clone())?;
            let value: serde_json::Value = client.get_json(&path).await.map_err(|e| {
                eprintln!("{}", e.user_message());
                e
            })?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Plans { path } => {
            let client = ApiClient::new(&config.api, session.clone())?;
            let plans: Vec<ActionPlan> = client.get_json(&path).await.map_err(|e| {
                eprintln!("{}", e.user_message());
                e
            })?;
            let rule = EscalationRule::from(&config.action_plan);
            print_plans(&rule, &plans);
        }
    }

    Ok(())
}

fn print_status(session: &SessionManager) -> anyhow::Result<()> {
    if !session.is_authenticated()? {
        println!("Not logged in");
        return Ok(());
    }

    match session.claims() {
        Ok(Some(claims)) => {
            for line in describe_claims(&claims, Utc::now()) {
                println!("{}", line);
            }
        }
        Ok(None) => println!("No access token, refresh token present"),
        Err(e) => println!("Access token unreadable: {}", e),
    }
    println!(
        "refresh token: {}",
        if session.refresh_token()?.is_some() {
            "present"
        } else {
            "absent"
        }
    );
    Ok(())
}

fn describe_claims(claims: &Claims, now: DateTime<Utc>) -> Vec<String> {
    vec![
        format!(
            "user: {}",
            claims
                .user_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("expires at: {}", claims.expires_at().to_rfc3339()),
        format!("remaining: {}s", claims.remaining(now).num_seconds()),
    ]
}

fn print_plans(rule: &EscalationRule, plans: &[ActionPlan]) {
    let today = chrono::Local::now().date_naive();
    let groups = rule.group_by_level(plans, today);
    if groups.is_empty() {
        println!("No open action plans");
        return;
    }
    for (level, plans) in groups.iter().rev() {
        println!("level {}:", level);
        for plan in plans {
            println!(
                "  #{} {} ({} days open)",
                plan.id,
                plan.title,
                rule.days_open(plan, today)
            );
        }
    }
}
