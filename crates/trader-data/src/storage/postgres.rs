//! PostgreSQL 시그널 저장소.
//!
//! `trading_signals` 테이블 한 행이 시그널 하나이며, 다섯 개 식별 컬럼에
//! 유니크 제약이 걸려 있습니다. 모든 쓰기는 단일 SQL 문입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{debug, info, instrument};
use trader_core::{
    CancelResult, ExitReason, Order, OrderStatus, Signal, SignalIdentity, SignalStore, StoreError,
    TradeType,
};

use crate::error::store_error;

/// 한 번의 INSERT에 넣을 최대 행 수 (바인드 파라미터 한도 고려).
const INSERT_CHUNK: usize = 1000;

const SELECT_COLUMNS: &str = r#"
    coin_pair, time_frame, trade_type, pattern, time_of_signal,
    price_at_time_of_signal, price_target, price_target_time, profit_potential_percent,
    volume, average_volume, last_tracked_price,
    is_signal_on, invalidation_reason, invalidated_at,
    entry_order_id, entry_executed_qty, entry_avg_price, entry_status,
    stop_limit_order_id, stop_limit_executed_qty, stop_limit_avg_price, stop_limit_status,
    exit_order_id, exit_executed_qty, exit_avg_price, exit_status,
    exit_reason, is_position_exited
"#;

const IDENTITY_FILTER: &str = "coin_pair = $1 AND time_frame = $2 AND trade_type = $3 \
                               AND pattern = $4 AND time_of_signal = $5";

// ==================== 행 변환 ====================

/// `trading_signals` 행.
#[derive(Debug, Clone, FromRow)]
struct SignalRecord {
    coin_pair: String,
    time_frame: String,
    trade_type: String,
    pattern: String,
    time_of_signal: DateTime<Utc>,
    price_at_time_of_signal: Decimal,
    price_target: Option<Decimal>,
    price_target_time: Option<DateTime<Utc>>,
    profit_potential_percent: Option<Decimal>,
    volume: Option<Decimal>,
    average_volume: Option<Decimal>,
    last_tracked_price: Option<Decimal>,
    is_signal_on: bool,
    invalidation_reason: Option<String>,
    invalidated_at: Option<DateTime<Utc>>,
    entry_order_id: Option<String>,
    entry_executed_qty: Option<Decimal>,
    entry_avg_price: Option<Decimal>,
    entry_status: Option<String>,
    stop_limit_order_id: Option<String>,
    stop_limit_executed_qty: Option<Decimal>,
    stop_limit_avg_price: Option<Decimal>,
    stop_limit_status: Option<String>,
    exit_order_id: Option<String>,
    exit_executed_qty: Option<Decimal>,
    exit_avg_price: Option<Decimal>,
    exit_status: Option<String>,
    exit_reason: Option<String>,
    is_position_exited: bool,
}

fn decode_order(
    order_id: Option<String>,
    executed_qty: Option<Decimal>,
    avg_price: Option<Decimal>,
    status: Option<String>,
) -> Result<Option<Order>, StoreError> {
    let Some(order_id) = order_id else {
        return Ok(None);
    };
    let status = status
        .as_deref()
        .unwrap_or("NEW")
        .parse::<OrderStatus>()
        .map_err(StoreError::Decode)?;
    Ok(Some(Order::new(
        order_id,
        executed_qty.unwrap_or(Decimal::ZERO),
        avg_price.unwrap_or(Decimal::ZERO),
        status,
    )))
}

impl TryFrom<SignalRecord> for Signal {
    type Error = StoreError;

    fn try_from(r: SignalRecord) -> Result<Self, Self::Error> {
        let decode = |e: trader_core::SignalError| StoreError::Decode(e.to_string());
        let trade_type = r.trade_type.parse::<TradeType>().map_err(decode)?;
        let identity =
            SignalIdentity::new(r.coin_pair, r.time_frame, trade_type, r.pattern, r.time_of_signal)
                .map_err(decode)?;

        let mut signal = Signal::new(identity, r.price_at_time_of_signal);
        signal.price_target = r.price_target;
        signal.price_target_time = r.price_target_time;
        signal.profit_potential_percent = r.profit_potential_percent;
        signal.volume = r.volume;
        signal.average_volume = r.average_volume;
        signal.last_tracked_price = r.last_tracked_price;
        signal.is_signal_on = r.is_signal_on;
        signal.invalidation_reason = r.invalidation_reason;
        signal.invalidated_at = r.invalidated_at;
        signal.entry_order = decode_order(
            r.entry_order_id,
            r.entry_executed_qty,
            r.entry_avg_price,
            r.entry_status,
        )?;
        signal.exit_stop_limit_order = decode_order(
            r.stop_limit_order_id,
            r.stop_limit_executed_qty,
            r.stop_limit_avg_price,
            r.stop_limit_status,
        )?;
        signal.exit_order = decode_order(
            r.exit_order_id,
            r.exit_executed_qty,
            r.exit_avg_price,
            r.exit_status,
        )?;
        signal.exit_reason = r
            .exit_reason
            .as_deref()
            .map(str::parse::<ExitReason>)
            .transpose()
            .map_err(StoreError::Decode)?;
        signal.is_position_exited = r.is_position_exited;
        Ok(signal)
    }
}

fn decode_all(records: Vec<SignalRecord>) -> Result<Vec<Signal>, StoreError> {
    records.into_iter().map(Signal::try_from).collect()
}

// ==================== 바인딩 ====================

fn bind_identity<'q>(
    query: Query<'q, Postgres, PgArguments>,
    id: &'q SignalIdentity,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(id.coin_pair())
        .bind(id.time_frame())
        .bind(id.trade_type().as_str())
        .bind(id.pattern())
        .bind(id.time_of_signal())
}

fn bind_identity_as<'q>(
    query: QueryAs<'q, Postgres, SignalRecord, PgArguments>,
    id: &'q SignalIdentity,
) -> QueryAs<'q, Postgres, SignalRecord, PgArguments> {
    query
        .bind(id.coin_pair())
        .bind(id.time_frame())
        .bind(id.trade_type().as_str())
        .bind(id.pattern())
        .bind(id.time_of_signal())
}

/// 영향받은 행이 없으면 NotFound.
fn expect_row(affected: u64, id: &SignalIdentity) -> Result<(), StoreError> {
    if affected == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

// ==================== 저장소 ====================

/// PostgreSQL 시그널 저장소.
#[derive(Clone)]
pub struct PgSignalStore {
    pool: PgPool,
}

impl PgSignalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, filter: &str) -> Result<Vec<Signal>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM trading_signals {filter} ORDER BY time_of_signal, id"
        );
        let records: Vec<SignalRecord> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        decode_all(records)
    }

    /// 청산 쓰기 결과 확인. 갱신된 행이 없으면 이미 청산된 시그널인지 구분합니다.
    async fn expect_open_row(&self, affected: u64, id: &SignalIdentity) -> Result<(), StoreError> {
        if affected > 0 {
            return Ok(());
        }
        match self.get_signal(id).await? {
            Some(signal) if signal.is_position_exited => {
                Err(StoreError::AlreadyExited(id.to_string()))
            }
            _ => Err(StoreError::NotFound(id.to_string())),
        }
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    #[instrument(skip_all, fields(signal = %identity))]
    async fn get_signal(&self, identity: &SignalIdentity) -> Result<Option<Signal>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM trading_signals WHERE {IDENTITY_FILTER}");
        let record: Option<SignalRecord> = bind_identity_as(sqlx::query_as(&sql), identity)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        record.map(Signal::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn all_signals(&self) -> Result<Vec<Signal>, StoreError> {
        self.fetch("").await
    }

    #[instrument(skip(self))]
    async fn open_signals(&self) -> Result<Vec<Signal>, StoreError> {
        self.fetch("WHERE is_position_exited = FALSE").await
    }

    #[instrument(skip_all, fields(count = signals.len()))]
    async fn insert_signals(&self, signals: &[Signal]) -> Result<u64, StoreError> {
        let mut inserted = 0;

        for chunk in signals.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO trading_signals (coin_pair, time_frame, trade_type, pattern, \
                 time_of_signal, price_at_time_of_signal, price_target, price_target_time, \
                 profit_potential_percent, volume, average_volume, is_signal_on) ",
            );
            builder.push_values(chunk, |mut row, s| {
                let id = s.identity();
                row.push_bind(id.coin_pair())
                    .push_bind(id.time_frame())
                    .push_bind(id.trade_type().as_str())
                    .push_bind(id.pattern())
                    .push_bind(id.time_of_signal())
                    .push_bind(s.price_at_time_of_signal)
                    .push_bind(s.price_target)
                    .push_bind(s.price_target_time)
                    .push_bind(s.profit_potential_percent)
                    .push_bind(s.volume)
                    .push_bind(s.average_volume)
                    .push_bind(s.is_signal_on);
            });
            builder.push(
                " ON CONFLICT (coin_pair, time_frame, trade_type, pattern, time_of_signal) DO NOTHING",
            );

            let result = builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
            inserted += result.rows_affected();
        }

        info!(
            requested = signals.len(),
            inserted, "신규 시그널 저장"
        );
        Ok(inserted)
    }

    #[instrument(skip_all, fields(signal = %identity))]
    async fn switch_off_signal(
        &self,
        identity: &SignalIdentity,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE trading_signals SET is_signal_on = FALSE, invalidation_reason = $6, \
             invalidated_at = $7, updated_at = NOW() WHERE {IDENTITY_FILTER}"
        );
        let result = bind_identity(sqlx::query(&sql), identity)
            .bind(reason)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        expect_row(result.rows_affected(), identity)
    }

    #[instrument(skip_all, fields(signal = %identity))]
    async fn record_entry(
        &self,
        identity: &SignalIdentity,
        entry: &Order,
        protective: &Order,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE trading_signals SET \
             entry_order_id = $6, entry_executed_qty = $7, entry_avg_price = $8, entry_status = $9, \
             stop_limit_order_id = $10, stop_limit_executed_qty = $11, stop_limit_avg_price = $12, \
             stop_limit_status = $13, updated_at = NOW() WHERE {IDENTITY_FILTER}"
        );
        let result = bind_identity(sqlx::query(&sql), identity)
            .bind(&entry.order_id)
            .bind(entry.executed_qty)
            .bind(entry.avg_price)
            .bind(entry.status.as_str())
            .bind(&protective.order_id)
            .bind(protective.executed_qty)
            .bind(protective.avg_price)
            .bind(protective.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        expect_row(result.rows_affected(), identity)
    }

    #[instrument(skip_all, fields(signal = %identity, status = %order.status))]
    async fn update_protective_order(
        &self,
        identity: &SignalIdentity,
        order: &Order,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE trading_signals SET \
             stop_limit_order_id = $6, stop_limit_executed_qty = $7, stop_limit_avg_price = $8, \
             stop_limit_status = $9, \
             exit_reason = CASE WHEN $9 = 'FILLED' AND NOT is_position_exited \
                 THEN $10 ELSE exit_reason END, \
             is_position_exited = CASE WHEN $9 = 'FILLED' THEN TRUE ELSE is_position_exited END, \
             updated_at = NOW() WHERE {IDENTITY_FILTER}"
        );
        let result = bind_identity(sqlx::query(&sql), identity)
            .bind(&order.order_id)
            .bind(order.executed_qty)
            .bind(order.avg_price)
            .bind(order.status.as_str())
            .bind(ExitReason::StopLoss.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if order.status.is_filled() {
            info!(signal = %identity, "보호 주문 체결, 손절 청산으로 기록");
        }
        expect_row(result.rows_affected(), identity)
    }

    #[instrument(skip_all, fields(signal = %identity))]
    async fn record_cancellation(
        &self,
        identity: &SignalIdentity,
        result: &CancelResult,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE trading_signals SET stop_limit_status = $6, updated_at = NOW() \
             WHERE {IDENTITY_FILTER} AND stop_limit_order_id = $7"
        );
        let outcome = bind_identity(sqlx::query(&sql), identity)
            .bind(result.status.as_str())
            .bind(&result.order_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        debug!(order_id = %result.order_id, status = %result.status, "보호 주문 취소 기록");
        expect_row(outcome.rows_affected(), identity)
    }

    #[instrument(skip_all, fields(signal = %identity, reason = %reason))]
    async fn record_exit_order(
        &self,
        identity: &SignalIdentity,
        order: &Order,
        reason: ExitReason,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE trading_signals SET \
             exit_order_id = $6, exit_executed_qty = $7, exit_avg_price = $8, exit_status = $9, \
             exit_reason = $10, is_position_exited = TRUE, updated_at = NOW() \
             WHERE {IDENTITY_FILTER} AND is_position_exited = FALSE"
        );
        let result = bind_identity(sqlx::query(&sql), identity)
            .bind(&order.order_id)
            .bind(order.executed_qty)
            .bind(order.avg_price)
            .bind(order.status.as_str())
            .bind(reason.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        self.expect_open_row(result.rows_affected(), identity).await
    }

    #[instrument(skip_all, fields(signal = %identity))]
    async fn mark_position_exited(
        &self,
        identity: &SignalIdentity,
        reason: ExitReason,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE trading_signals SET exit_reason = $6, is_position_exited = TRUE, \
             updated_at = NOW() WHERE {IDENTITY_FILTER} AND is_position_exited = FALSE"
        );
        let result = bind_identity(sqlx::query(&sql), identity)
            .bind(reason.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        self.expect_open_row(result.rows_affected(), identity).await
    }
}
