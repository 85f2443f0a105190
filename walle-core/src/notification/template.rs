//! Rendering of notification data into user-facing text.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use walle_sdk::objects::NotificationEvent;

pub const DEPOSIT_TEMPLATE: &str = "deposit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("notification data is missing `{0}`")]
    MissingField(&'static str),

    #[error("notification field `{0}` has an invalid value")]
    InvalidField(&'static str),

    #[error("unknown template: {0}")]
    UnknownTemplate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

pub fn render(notification: &NotificationEvent) -> Result<RenderedMessage, TemplateError> {
    let template = text_field(notification, "template")?;
    match template {
        DEPOSIT_TEMPLATE => render_deposit(notification),
        other => Err(TemplateError::UnknownTemplate(other.to_string())),
    }
}

fn render_deposit(notification: &NotificationEvent) -> Result<RenderedMessage, TemplateError> {
    let amount = amount_field(notification, "amount")?;
    let transaction_id = text_field(notification, "transaction_id")?;
    let wallet_id = text_field(notification, "wallet_id")?;

    Ok(RenderedMessage {
        subject: "Deposit successful".to_string(),
        body: format!(
            "Deposit of {amount:.2}, with transaction {transaction_id} to wallet {wallet_id} was successful"
        ),
    })
}

fn text_field<'a>(
    notification: &'a NotificationEvent,
    field: &'static str,
) -> Result<&'a str, TemplateError> {
    match notification.data.get(field) {
        None | Some(Value::Null) => Err(TemplateError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(TemplateError::InvalidField(field)),
    }
}

fn amount_field(
    notification: &NotificationEvent,
    field: &'static str,
) -> Result<Decimal, TemplateError> {
    let parsed = match notification.data.get(field) {
        None | Some(Value::Null) => return Err(TemplateError::MissingField(field)),
        Some(Value::String(s)) => Decimal::from_str(s),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()),
        Some(_) => return Err(TemplateError::InvalidField(field)),
    };
    parsed.map_err(|_| TemplateError::InvalidField(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit_notification() -> NotificationEvent {
        NotificationEvent::new("email")
            .with("template", DEPOSIT_TEMPLATE)
            .with("wallet_id", "w-1")
            .with("transaction_id", "t-1")
    }

    #[test]
    fn renders_deposit_with_two_decimals() {
        let rendered = render(&deposit_notification().with("amount", "100")).unwrap();
        assert_eq!(
            rendered.body,
            "Deposit of 100.00, with transaction t-1 to wallet w-1 was successful"
        );
        assert_eq!(rendered.subject, "Deposit successful");
    }

    #[test]
    fn accepts_numeric_amount() {
        let rendered = render(&deposit_notification().with("amount", 12.5)).unwrap();
        assert!(rendered.body.starts_with("Deposit of 12.50,"));
    }

    #[test]
    fn rejects_incomplete_data() {
        assert_eq!(
            render(&deposit_notification()),
            Err(TemplateError::MissingField("amount"))
        );
        assert_eq!(
            render(&deposit_notification().with("amount", "lots")),
            Err(TemplateError::InvalidField("amount"))
        );
        assert_eq!(
            render(&NotificationEvent::new("email")),
            Err(TemplateError::MissingField("template"))
        );
        assert_eq!(
            render(&NotificationEvent::new("email").with("template", "withdraw")),
            Err(TemplateError::UnknownTemplate("withdraw".to_string()))
        );
    }
}
