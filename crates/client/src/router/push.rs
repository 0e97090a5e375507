//! Push messages and notification clicks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::Error;

use super::{Notification, NotificationAction, OfflineRouter, WindowClient};

/// `data` object of a push payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PushData {
    #[serde(default)]
    pub url: Option<String>,
}

/// JSON body of a push message. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub data: Option<PushData>,
    #[serde(default)]
    pub actions: Option<Vec<NotificationAction>>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub require_interaction: Option<bool>,
}

impl PushPayload {
    /// Decode raw push bytes. Anything that isn't a JSON object becomes the body text.
    pub fn decode(raw: Option<&[u8]>) -> Self {
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };
        serde_json::from_slice(raw).unwrap_or_else(|_| Self {
            body: Some(String::from_utf8_lossy(raw).into_owned()),
            ..Self::default()
        })
    }
}

/// A click on a displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClick {
    /// Action button pressed, if any.
    #[serde(default)]
    pub action: Option<String>,
    pub tag: String,
    /// Route or URL carried by the notification; `/` when absent.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", content = "window", rename_all = "snake_case")]
pub enum ClickOutcome {
    Dismissed,
    Focused(WindowClient),
    Opened(WindowClient),
}

impl OfflineRouter {
    /// Build a notification from a push message and display it.
    pub async fn handle_push(&self, raw: Option<&[u8]>) -> Result<Notification, Error> {
        let payload = PushPayload::decode(raw);
        let defaults = &self.config.notifications;

        let notification = Notification {
            title: payload.title.unwrap_or_else(|| defaults.title.clone()),
            body: payload.body.unwrap_or_else(|| defaults.body.clone()),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            image: payload.image,
            tag: payload.tag.unwrap_or_else(|| defaults.tag.clone()),
            require_interaction: payload.require_interaction.unwrap_or(false),
            actions: payload.actions.unwrap_or_else(|| defaults.actions.clone()),
            url: payload
                .data
                .and_then(|data| data.url)
                .unwrap_or_else(|| defaults.url.clone()),
        };

        self.host.notifications.show(&notification).await?;
        tracing::info!(tag = %notification.tag, title = %notification.title, "notification shown");
        Ok(notification)
    }

    /// Close the notification, then focus a window already showing the
    /// target or open a new one. The `close` action only dismisses.
    pub async fn handle_notification_click(&self, click: &NotificationClick) -> Result<ClickOutcome, Error> {
        self.host.notifications.close(&click.tag).await?;

        if click.action.as_deref() == Some("close") {
            tracing::debug!(tag = %click.tag, "notification dismissed");
            return Ok(ClickOutcome::Dismissed);
        }

        let route = click.url.as_deref().unwrap_or(&self.config.notifications.url);
        let target = self.config.url_for(route)?;

        let windows = self.host.clients.windows().await?;
        let existing = windows
            .iter()
            .find(|window| url::Url::parse(&window.url).is_ok_and(|url| url == target));

        match existing {
            Some(window) => {
                let focused = self.host.clients.focus(&window.id).await?;
                tracing::debug!(url = %target, window = %focused.id, "focused existing window");
                Ok(ClickOutcome::Focused(focused))
            }
            None => {
                let opened = self.host.clients.open_window(target.as_str()).await?;
                tracing::debug!(url = %target, window = %opened.id, "opened window");
                Ok(ClickOutcome::Opened(opened))
            }
        }
    }
}
