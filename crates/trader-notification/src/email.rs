//! 이메일 알림 서비스.
//!
//! SMTP를 통해 운영자에게 청산 실패 등 수동 조치가 필요한 상황을 알립니다.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};
use trader_core::Notifier;

use crate::types::{NotificationError, NotificationResult};

/// 제목 앞에 붙는 태그
const SUBJECT_PREFIX: &str = "[SignalTrader]";

/// 이메일 알림 전송 설정.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP 서버 호스트
    pub smtp_host: String,
    /// SMTP 서버 포트
    pub smtp_port: u16,
    /// TLS 사용 여부
    pub use_tls: bool,
    /// SMTP 사용자명
    pub username: String,
    /// SMTP 비밀번호
    pub password: SecretString,
    /// 발신자 이메일 주소
    pub from_email: String,
    /// 발신자 이름 (선택)
    pub from_name: Option<String>,
    /// 수신자 이메일 주소 목록
    pub to_emails: Vec<String>,
    /// 전송 활성화 여부
    pub enabled: bool,
}

impl EmailConfig {
    /// 새 이메일 설정을 생성합니다.
    pub fn new(
        smtp_host: impl Into<String>,
        smtp_port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        from_email: impl Into<String>,
        to_emails: Vec<String>,
    ) -> Self {
        Self {
            smtp_host: smtp_host.into(),
            smtp_port,
            use_tls: true,
            username: username.into(),
            password: SecretString::from(password.into()),
            from_email: from_email.into(),
            from_name: None,
            to_emails,
            enabled: true,
        }
    }

    /// 발신자 이름을 설정합니다.
    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// 필수 변수가 하나라도 없으면 `None` (이메일 알림 비활성).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("EMAIL_SMTP_HOST").ok()?;
        let smtp_port = std::env::var("EMAIL_SMTP_PORT").ok()?.parse::<u16>().ok()?;
        let username = std::env::var("EMAIL_USERNAME").ok()?;
        let password = std::env::var("EMAIL_PASSWORD").ok()?;
        let from_email = std::env::var("EMAIL_FROM").ok()?;
        let from_name = std::env::var("EMAIL_FROM_NAME").ok();
        let to_emails = parse_recipients(&std::env::var("EMAIL_TO").ok()?);

        let enabled = std::env::var("EMAIL_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);
        let use_tls = std::env::var("EMAIL_USE_TLS")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Some(Self {
            smtp_host,
            smtp_port,
            use_tls,
            username,
            password: SecretString::from(password),
            from_email,
            from_name,
            to_emails,
            enabled,
        })
    }
}

/// 쉼표로 구분된 수신자 목록 파싱 (빈 항목 제외).
fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 이메일 알림 전송기.
pub struct EmailSender {
    config: EmailConfig,
}

impl EmailSender {
    /// 새 이메일 전송기를 생성합니다.
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// 환경 변수에서 전송기를 생성합니다.
    pub fn from_env() -> Option<Self> {
        EmailConfig::from_env().map(Self::new)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
            && !self.config.smtp_host.is_empty()
            && !self.config.username.is_empty()
            && !self.config.to_emails.is_empty()
    }

    fn format_subject(subject: &str) -> String {
        format!("{} {}", SUBJECT_PREFIX, subject)
    }

    fn format_body(body: &str) -> String {
        format!(
            "{}\n\n-- \n{}",
            body,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    fn mailer(&self) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        let mailer = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| NotificationError::SendFailed(format!("SMTP 연결 실패: {}", e)))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        };
        Ok(mailer)
    }

    /// 이메일을 전송합니다.
    pub async fn send_email(&self, subject: &str, body: &str) -> NotificationResult<()> {
        let from_mailbox: Mailbox = match &self.config.from_name {
            Some(name) => format!("{} <{}>", name, self.config.from_email).parse(),
            None => self.config.from_email.parse(),
        }
        .map_err(|e| NotificationError::InvalidConfig(format!("잘못된 발신자 주소: {}", e)))?;

        let subject = Self::format_subject(subject);
        let body = Self::format_body(body);
        let mailer = self.mailer()?;

        // 각 수신자에게 이메일 전송
        for to_email in &self.config.to_emails {
            let to_mailbox: Mailbox = to_email.parse().map_err(|e| {
                NotificationError::InvalidConfig(format!("잘못된 수신자 주소: {}", e))
            })?;

            let email = Message::builder()
                .from(from_mailbox.clone())
                .to(to_mailbox)
                .subject(subject.as_str())
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| NotificationError::SendFailed(format!("이메일 생성 실패: {}", e)))?;

            match mailer.send(email).await {
                Ok(_) => {
                    debug!("이메일 전송 성공: {}", to_email);
                }
                Err(e) => {
                    error!("이메일 전송 실패 ({}): {}", to_email, e);
                    return Err(NotificationError::SendFailed(format!(
                        "이메일 전송 실패: {}",
                        e
                    )));
                }
            }
        }

        info!(
            "이메일 알림 전송 완료: {} 수신자",
            self.config.to_emails.len()
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailSender {
    async fn alert(&self, subject: &str, body: &str) {
        if !self.is_enabled() {
            debug!("이메일 알림이 비활성화되어 있습니다");
            return;
        }

        // 전송 실패는 로그만 남김
        if let Err(e) = self.send_email(subject, body).await {
            error!(subject, error = %e, "운영자 알림 전송 실패");
        }
    }
}
