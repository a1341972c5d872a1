//! 협력자 조립.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::info;
use trader_core::{Clock, Notifier, SignalStore, SpotExchange, SystemClock};
use trader_data::{Database, DatabaseConfig, PgSignalStore};
use trader_exchange::{BinanceClient, BinanceConfig, BinanceExchangeProvider};
use trader_execution::{EntryConfig, EntryExecutor, PositionExitReconciler};
use trader_notification::{EmailConfig, EmailSender, LogNotifier};

use crate::config::{mask_database_url, DaemonConfig};
use crate::Result;

/// 데몬 실행에 필요한 설정과 협력자 묶음.
#[derive(Clone)]
pub struct App {
    pub config: DaemonConfig,
    pub store: Arc<dyn SignalStore>,
    pub exchange: Arc<dyn SpotExchange>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    database: Option<Database>,
}

impl App {
    /// DB와 거래소에 연결해 앱 생성.
    pub async fn connect(config: DaemonConfig) -> Result<Self> {
        info!(database_url = %mask_database_url(&config.database_url), "DB 연결 중");
        let database = Database::connect(
            &DatabaseConfig::new(config.database_url.clone())
                .with_max_connections(config.database_max_connections),
        )
        .await?;
        database.migrate().await?;
        let store = Arc::new(PgSignalStore::new(database.pool().clone()));

        let mut binance = BinanceConfig::new(
            config.binance.api_key.clone(),
            config.binance.api_secret.expose_secret().to_string(),
        )
        .with_timeout(Duration::from_secs(config.binance.timeout_secs));
        if let Some(base_url) = &config.binance.base_url {
            binance = binance.with_base_url(base_url.clone());
        }
        let client = BinanceClient::new(binance)?;
        info!(base_url = client.base_url(), "Binance 클라이언트 생성");
        let exchange = Arc::new(BinanceExchangeProvider::from_client(client));

        let notifier: Arc<dyn Notifier> = match EmailConfig::from_env() {
            Some(email) => {
                info!("이메일 알림 활성화");
                Arc::new(EmailSender::new(email))
            }
            None => {
                info!("이메일 설정 없음, 알림은 로그로만 기록");
                Arc::new(LogNotifier)
            }
        };

        let mut app = Self::from_parts(config, store, exchange, notifier, Arc::new(SystemClock));
        app.database = Some(database);
        Ok(app)
    }

    /// 이미 만들어진 협력자로 앱 생성.
    pub fn from_parts(
        config: DaemonConfig,
        store: Arc<dyn SignalStore>,
        exchange: Arc<dyn SpotExchange>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            exchange,
            notifier,
            clock,
            database: None,
        }
    }

    pub fn entry_executor(&self) -> EntryExecutor {
        EntryExecutor::new(
            self.exchange.clone(),
            self.store.clone(),
            EntryConfig {
                stop_loss_percent: self.config.trading.stop_loss_percent,
                quote_amount: self.config.trading.entry_quote_amount,
            },
        )
    }

    pub fn exit_reconciler(&self) -> PositionExitReconciler {
        PositionExitReconciler::new(
            self.exchange.clone(),
            self.store.clone(),
            self.notifier.clone(),
        )
    }

    /// DB 연결 종료.
    pub async fn shutdown(&self) {
        if let Some(database) = &self.database {
            database.close().await;
            info!("DB 연결 종료");
        }
    }
}
