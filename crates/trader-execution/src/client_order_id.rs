//! 결정적 클라이언트 주문 ID.
//!
//! 같은 시그널의 같은 역할 주문은 항상 같은 ID를 가집니다. 이전 주기에서 결과가
//! 불명확했던 주문을 다시 내기 전에 이 ID로 거래소를 조회합니다.
//!
//! 형식: `sig-<sha256 앞 28자>-<역할>` (35자, Binance 허용 문자 `[A-Za-z0-9_-]`).

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};
use trader_core::SignalIdentity;

const DIGEST_LEN: usize = 28;

/// 시그널에 붙는 주문 역할.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRole {
    /// 진입 시장가 매수
    Entry,
    /// 보호용 스탑 리밋
    Protective,
    /// 청산 시장가 매도
    Exit,
}

impl OrderRole {
    fn suffix(self) -> &'static str {
        match self {
            OrderRole::Entry => "en",
            OrderRole::Protective => "sl",
            OrderRole::Exit => "ex",
        }
    }
}

/// 시그널 식별자와 역할로 클라이언트 주문 ID 생성.
pub fn client_order_id(identity: &SignalIdentity, role: OrderRole) -> String {
    let mut hasher = Sha256::new();
    for part in [
        identity.coin_pair(),
        identity.time_frame(),
        identity.trade_type().as_str(),
        identity.pattern(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hasher.update(
        identity
            .time_of_signal()
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .as_bytes(),
    );

    let digest = hex::encode(hasher.finalize());
    format!("sig-{}-{}", &digest[..DIGEST_LEN], role.suffix())
}
