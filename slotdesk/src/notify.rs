//! Notification intents for waiters.
//!
//! Nothing here delivers a message. The allocation reducer builds a
//! [`MessageIntent`] (recipient, body and an `sms:` deep link) and hands it to
//! the injected [`MessageDispatcher`]; the dispatcher decides how the intent
//! reaches the operator's device.

use crate::model::{Waiter, WaiterId};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};

/// Default program name prefixed to every message
pub const DEFAULT_PROGRAM_NAME: &str = "경상북도평생교육사협회 체험 프로그램";

/// Device family the `sms:` link is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    /// `sms:<digits>?body=...`
    #[default]
    Android,
    /// `sms:<digits>&body=...`
    Ios,
}

impl Platform {
    /// Parse a configuration value (`android` or `ios`, case-insensitive)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "android" => Some(Self::Android),
            "ios" => Some(Self::Ios),
            _ => None,
        }
    }

    const fn body_separator(self) -> char {
        match self {
            Self::Android => '?',
            Self::Ios => '&',
        }
    }
}

/// What a message is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Confirms registration and reports the 1-based queue position
    QueuePosition {
        /// `index + 1` at the moment the message was built
        position: usize,
    },
    /// Tells the waiter their slot is ready
    CallForward,
}

/// A message ready to be handed to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageIntent {
    /// Waiter the message is about
    pub waiter_id: WaiterId,
    /// Recipient display name
    pub recipient: String,
    /// Phone number as entered
    pub phone_number: String,
    /// Why the message is sent
    pub kind: MessageKind,
    /// Plain-text body
    pub body: String,
    /// `sms:` deep link carrying the percent-encoded body
    pub link: String,
}

/// Builds message bodies and links
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    program_name: String,
    platform: Platform,
}

impl MessageTemplates {
    /// Templates for `program_name`, linking for `platform`
    #[must_use]
    pub fn new(program_name: impl Into<String>, platform: Platform) -> Self {
        Self {
            program_name: program_name.into(),
            platform,
        }
    }

    /// Registration / reminder message with the waiter's queue position
    #[must_use]
    pub fn queue_position(&self, waiter: &Waiter, position: usize) -> MessageIntent {
        let body = format!(
            "[{}] 안녕하세요, {}님. 대기 명단에 등록되셨습니다. 현재 대기 {position}번째입니다. 자리가 준비되면 다시 알려드리겠습니다.",
            self.program_name, waiter.name
        );
        self.intent(waiter, MessageKind::QueuePosition { position }, body)
    }

    /// "Your slot is ready" message
    #[must_use]
    pub fn call_forward(&self, waiter: &Waiter) -> MessageIntent {
        let body = format!(
            "[{}] 안녕하세요, {}님! 자리가 준비되었습니다. 5분 내에 오지 않으면 취소하오니, 지금 바로 와주세요.",
            self.program_name, waiter.name
        );
        self.intent(waiter, MessageKind::CallForward, body)
    }

    fn intent(&self, waiter: &Waiter, kind: MessageKind, body: String) -> MessageIntent {
        MessageIntent {
            waiter_id: waiter.id.clone(),
            recipient: waiter.name.clone(),
            phone_number: waiter.phone_number.clone(),
            kind,
            link: sms_link(&waiter.phone_number, &body, self.platform),
            body,
        }
    }
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM_NAME, Platform::default())
    }
}

/// `sms:` deep link for `phone_number` with a prefilled body
#[must_use]
pub fn sms_link(phone_number: &str, body: &str, platform: Platform) -> String {
    let digits: String = phone_number.chars().filter(char::is_ascii_digit).collect();
    format!(
        "sms:{digits}{}body={}",
        platform.body_separator(),
        urlencoding::encode(body)
    )
}

/// Hands message intents to whatever opens them on the device
pub trait MessageDispatcher: Send + Sync {
    /// Deliver the intent to the OS or the operator
    fn dispatch(&self, intent: MessageIntent) -> BoxFuture<'static, ()>;
}

/// Logs every intent and does nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

impl MessageDispatcher for TracingDispatcher {
    fn dispatch(&self, intent: MessageIntent) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tracing::info!(
                waiter = %intent.waiter_id,
                kind = ?intent.kind,
                link = %intent.link,
                "Message intent ready"
            );
        })
    }
}

/// Keeps every dispatched intent for later inspection
#[derive(Debug, Clone, Default)]
pub struct CollectingDispatcher {
    sent: Arc<Mutex<Vec<MessageIntent>>>,
}

impl CollectingDispatcher {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything dispatched so far
    #[must_use]
    pub fn take(&self) -> Vec<MessageIntent> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of intents currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been dispatched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageDispatcher for CollectingDispatcher {
    fn dispatch(&self, intent: MessageIntent) -> BoxFuture<'static, ()> {
        let sent = Arc::clone(&self.sent);
        Box::pin(async move {
            sent.lock().unwrap_or_else(PoisonError::into_inner).push(intent);
        })
    }
}
