//! Signal trader daemon CLI.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trader_core::{min_entry_value_usd, min_exit_quantity, SignalIdentity, TradeType};
use trader_daemon::{modules, App, DaemonConfig};

#[derive(Parser)]
#[command(name = "trader-daemon")]
#[command(about = "Chart pattern signal trader for Binance Spot", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 모드 (동기화/진입, 청산 확인, 레벨 스캔을 주기 실행)
    Daemon,

    /// 시그널 소스 동기화 1회 실행
    SyncSignals,

    /// 진입하지 않은 시그널 진입 1회 실행
    EnterSignals,

    /// 열린 포지션 청산 확인 1회 실행
    CheckExits,

    /// 지지/저항 레벨 스캔 1회 실행
    ScanLevels,

    /// 시그널 포지션 강제 청산
    ForceExit {
        /// 거래 페어 (예: BTCUSDT)
        #[arg(long)]
        pair: String,

        /// 시간 프레임 (예: 4h)
        #[arg(long)]
        time_frame: String,

        /// BUY 또는 SELL
        #[arg(long)]
        trade_type: TradeType,

        /// 패턴 이름
        #[arg(long)]
        pattern: String,

        /// 시그널 발생 시각 (RFC 3339)
        #[arg(long)]
        time: DateTime<Utc>,
    },

    /// 최소 진입 금액 계산 (거래소 연결 없음)
    Size {
        /// 최소 주문 금액
        #[arg(long)]
        min_notional: Decimal,

        /// 수량 소수점 자릿수
        #[arg(long)]
        step_decimals: u32,

        /// 손절 비율 (%)
        #[arg(long, default_value = "5")]
        stop_loss: Decimal,

        /// 진입 가격
        #[arg(long)]
        price: Decimal,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "trader_daemon={lvl},trader_execution={lvl},trader_exchange={lvl},\
                     trader_data={lvl},trader_notification={lvl}",
                    lvl = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Commands::Size {
        min_notional,
        step_decimals,
        stop_loss,
        price,
    } = cli.command
    {
        let entry_value = min_entry_value_usd(min_notional, step_decimals, stop_loss, price)?;
        let exit_quantity = min_exit_quantity(min_notional, step_decimals, price)?;
        println!("min_entry_value_usd: {entry_value}");
        println!("min_exit_quantity:   {exit_quantity}");
        return Ok(());
    }

    let config = DaemonConfig::from_env().context("설정 로드 실패")?;
    let app = App::connect(config).await.context("초기화 실패")?;
    tracing::info!(exchange = app.exchange.exchange_name(), "Signal Trader 시작");

    match cli.command {
        Commands::Daemon => run_daemon(&app).await,
        Commands::SyncSignals => {
            let stats = modules::sync_signals(&app).await?;
            println!(
                "read={} inserted={} switched_off={} failed={}",
                stats.read, stats.inserted, stats.switched_off, stats.failed
            );
        }
        Commands::EnterSignals => {
            modules::enter_signals(&app).await?.log_summary("진입");
        }
        Commands::CheckExits => {
            modules::check_exits(&app).await?.log_summary("청산 확인");
        }
        Commands::ScanLevels => {
            for scan in modules::scan_price_levels(&app).await? {
                println!(
                    "{:<12} {} → {}  {}",
                    scan.pair, scan.prev_close, scan.curr_close, scan.movement.state
                );
            }
        }
        Commands::ForceExit {
            pair,
            time_frame,
            trade_type,
            pattern,
            time,
        } => {
            let identity = SignalIdentity::new(pair, time_frame, trade_type, pattern, time)?;
            let outcome = modules::force_exit(&app, &identity).await?;
            println!("{outcome:?}");
        }
        Commands::Size { .. } => {}
    }

    app.shutdown().await;
    tracing::info!("Signal Trader 종료");
    Ok(())
}

/// 그룹 A: 시그널 동기화 후 신규 시그널 진입
async fn run_signal_workflow(app: App) {
    match modules::sync_signals(&app).await {
        Ok(stats) => tracing::debug!(inserted = stats.inserted, "[A] 동기화 완료"),
        Err(e) => tracing::error!("[A] 시그널 동기화 실패: {}", e),
    }
    match modules::enter_signals(&app).await {
        Ok(stats) => stats.log_summary("[A] 진입"),
        Err(e) => tracing::error!("[A] 진입 실패: {}", e),
    }
}

/// 그룹 B: 청산 확인
async fn run_exit_workflow(app: App) {
    match modules::check_exits(&app).await {
        Ok(stats) => stats.log_summary("[B] 청산 확인"),
        Err(e) => tracing::error!("[B] 청산 확인 실패: {}", e),
    }
}

/// 그룹 C: 레벨 스캔
async fn run_scan_workflow(app: App) {
    if app.config.price_levels.is_empty() {
        return;
    }
    if let Err(e) = modules::scan_price_levels(&app).await {
        tracing::error!("[C] 레벨 스캔 실패: {}", e);
    }
}

async fn run_daemon(app: &App) {
    tracing::info!(
        "=== 데몬 모드 시작 ===\n  \
         [Group A] 시그널 동기화 + 진입: {}초 (매매 {})\n  \
         [Group B] 청산 확인: {}초\n  \
         [Group C] 레벨 스캔: {}초 ({}개 페어)",
        app.config.schedule.sync_interval_secs,
        if app.config.trading.enabled { "활성" } else { "비활성" },
        app.config.schedule.exit_check_interval_secs,
        app.config.schedule.price_scan_interval_secs,
        app.config.price_levels.len(),
    );

    // 종료 시그널 공유
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let group_a = tokio::spawn(run_periodic(
        "Group A",
        app.config.schedule.sync_interval(),
        shutdown_tx.subscribe(),
        app.clone(),
        run_signal_workflow,
    ));
    let group_b = tokio::spawn(run_periodic(
        "Group B",
        app.config.schedule.exit_check_interval(),
        shutdown_tx.subscribe(),
        app.clone(),
        run_exit_workflow,
    ));
    let group_c = tokio::spawn(run_periodic(
        "Group C",
        app.config.schedule.price_scan_interval(),
        shutdown_tx.subscribe(),
        app.clone(),
        run_scan_workflow,
    ));

    // Ctrl+C 대기 후 종료 시그널 전송
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("종료 신호 수신, 데몬 종료 중...");
    let _ = shutdown_tx.send(());

    let _ = tokio::join!(group_a, group_b, group_c);
}

/// 워크플로우 주기 실행.
///
/// 주문 중간에 끊기지 않도록 실행 중인 워크플로우는 끝까지 수행하고,
/// 종료 신호는 실행 사이에만 확인합니다.
async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    app: App,
    workflow: F,
) where
    F: Fn(App) -> Fut,
    Fut: Future<Output = ()>,
{
    workflow(app.clone()).await;
    tracing::info!("[{}] 첫 실행 완료, 다음 실행: {}초 후", name, period.as_secs());

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // 첫 tick 즉시 반환 (소비)

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("[{}] 종료 신호 수신", name);
                break;
            }
            _ = interval.tick() => {
                workflow(app.clone()).await;
                tracing::debug!("[{}] 다음 실행: {}초 후", name, period.as_secs());
            }
        }
    }
}
