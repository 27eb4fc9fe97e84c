//! Push messages and notification clicks.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::error::OfflineError;
use super::lock::mutex_lock;

const SOURCE: &str = "offline::push";

pub const NOTIFICATION_TITLE: &str = "TO DO LIST";
pub const DEFAULT_BODY: &str = "You have new tasks to complete!";
pub const DEFAULT_TARGET: &str = "/index.html";
pub const ACTION_VIEW: &str = "view";
pub const ACTION_DISMISS: &str = "dismiss";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// A displayed (or displayable) notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: Map<String, Value>,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// The default descriptor before any payload is applied.
    pub fn default_descriptor() -> Self {
        let mut data = Map::new();
        data.insert("url".to_string(), Value::String(DEFAULT_TARGET.to_string()));

        Self {
            id: 0,
            title: NOTIFICATION_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            icon: "/placeholder.svg?height=192&width=192&text=todo".to_string(),
            badge: "/placeholder.svg?height=72&width=72&text=todo".to_string(),
            vibrate: vec![200, 100, 200],
            data,
            actions: vec![
                NotificationAction {
                    action: ACTION_VIEW.to_string(),
                    title: "View".to_string(),
                    icon: "/placeholder.svg?height=32&width=32&text=view".to_string(),
                },
                NotificationAction {
                    action: ACTION_DISMISS.to_string(),
                    title: "Dismiss".to_string(),
                    icon: "/placeholder.svg?height=32&width=32&text=close".to_string(),
                },
            ],
        }
    }

    /// Apply a push payload: a string `body` replaces the text, every other
    /// field is merged into `data`.
    pub fn from_payload(payload: Option<&[u8]>) -> Self {
        let mut notification = Self::default_descriptor();
        let Some(raw) = payload.filter(|raw| !raw.is_empty()) else {
            return notification;
        };

        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(fields)) => {
                for (key, value) in fields {
                    if key == "body" {
                        if let Value::String(text) = value
                            && !text.is_empty()
                        {
                            notification.body = text;
                        }
                        continue;
                    }
                    notification.data.insert(key, value);
                }
            }
            Ok(_) => {
                warn!(
                    target: "todolist::offline::push",
                    "push payload is not a JSON object, using defaults"
                );
            }
            Err(err) => {
                warn!(
                    target: "todolist::offline::push",
                    error = %err,
                    "push payload is not JSON, using defaults"
                );
            }
        }

        notification
    }

    pub fn target_url(&self) -> &str {
        self.data
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TARGET)
    }
}

/// Displays and closes notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show `notification`, returning the id it was assigned.
    async fn show(&self, notification: Notification) -> Result<u64, OfflineError>;

    async fn close(&self, id: u64) -> Result<(), OfflineError>;
}

/// In-process notification display. Pages poll it for what is showing.
#[derive(Default)]
pub struct NotificationCenter {
    next_id: AtomicU64,
    showing: Mutex<BTreeMap<u64, Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<Notification> {
        mutex_lock(&self.showing, SOURCE, "list")
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<Notification> {
        mutex_lock(&self.showing, SOURCE, "get").get(&id).cloned()
    }
}

#[async_trait]
impl Notifier for NotificationCenter {
    async fn show(&self, mut notification: Notification) -> Result<u64, OfflineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        notification.id = id;
        info!(
            target: "todolist::offline::push",
            id,
            title = %notification.title,
            body = %notification.body,
            url = notification.target_url(),
            "showing notification"
        );
        mutex_lock(&self.showing, SOURCE, "show").insert(id, notification);
        Ok(id)
    }

    async fn close(&self, id: u64) -> Result<(), OfflineError> {
        mutex_lock(&self.showing, SOURCE, "close").remove(&id);
        Ok(())
    }
}

/// An open page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: u64,
    pub url: String,
}

/// The pages this layer controls.
#[async_trait]
pub trait Clients: Send + Sync {
    async fn match_all(&self) -> Result<Vec<ClientInfo>, OfflineError>;

    async fn focus(&self, id: u64) -> Result<(), OfflineError>;

    async fn open_window(&self, url: &str) -> Result<ClientInfo, OfflineError>;

    /// Take control of every open page.
    async fn claim(&self) -> Result<(), OfflineError>;
}

#[derive(Default)]
struct ClientsState {
    windows: Vec<ClientInfo>,
    focused: Option<u64>,
    opened: Vec<String>,
    claimed: bool,
}

/// Records page interactions instead of driving a real browser.
#[derive(Default)]
pub struct MemoryClients {
    next_id: AtomicU64,
    state: Mutex<ClientsState>,
}

impl MemoryClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, url: impl Into<String>) -> ClientInfo {
        let client = ClientInfo {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            url: url.into(),
        };
        mutex_lock(&self.state, SOURCE, "add")
            .windows
            .push(client.clone());
        client
    }

    pub fn focused(&self) -> Option<u64> {
        mutex_lock(&self.state, SOURCE, "focused").focused
    }

    pub fn opened(&self) -> Vec<String> {
        mutex_lock(&self.state, SOURCE, "opened").opened.clone()
    }

    pub fn claimed(&self) -> bool {
        mutex_lock(&self.state, SOURCE, "claimed").claimed
    }
}

#[async_trait]
impl Clients for MemoryClients {
    async fn match_all(&self) -> Result<Vec<ClientInfo>, OfflineError> {
        Ok(mutex_lock(&self.state, SOURCE, "match_all").windows.clone())
    }

    async fn focus(&self, id: u64) -> Result<(), OfflineError> {
        mutex_lock(&self.state, SOURCE, "focus").focused = Some(id);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<ClientInfo, OfflineError> {
        let client = self.add(url);
        let mut state = mutex_lock(&self.state, SOURCE, "open_window");
        state.opened.push(url.to_string());
        state.focused = Some(client.id);
        Ok(client)
    }

    async fn claim(&self) -> Result<(), OfflineError> {
        mutex_lock(&self.state, SOURCE, "claim").claimed = true;
        Ok(())
    }
}

/// What a notification click ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    Focused { client: ClientInfo },
    Opened { client: ClientInfo },
    Closed,
}

/// Push and click handling over injected collaborators.
pub struct PushHandler<'a> {
    notifier: &'a dyn Notifier,
    clients: &'a dyn Clients,
}

impl<'a> PushHandler<'a> {
    pub fn new(notifier: &'a dyn Notifier, clients: &'a dyn Clients) -> Self {
        Self { notifier, clients }
    }

    /// Build the notification for `payload` and display it.
    pub async fn on_push(&self, payload: Option<&[u8]>) -> Result<Notification, OfflineError> {
        let mut notification = Notification::from_payload(payload);
        notification.id = self.notifier.show(notification.clone()).await?;
        Ok(notification)
    }

    /// Close the notification, then focus or open the target page unless
    /// the action was `dismiss`.
    pub async fn on_click(
        &self,
        notification: &Notification,
        action: Option<&str>,
    ) -> Result<ClickOutcome, OfflineError> {
        self.notifier.close(notification.id).await?;

        let action = action.filter(|action| !action.is_empty());
        if action.is_some_and(|action| action != ACTION_VIEW) {
            return Ok(ClickOutcome::Closed);
        }

        let target = notification.target_url();
        let open = self.clients.match_all().await?;
        if let Some(client) = open.into_iter().find(|client| client.url.contains(target)) {
            self.clients.focus(client.id).await?;
            return Ok(ClickOutcome::Focused { client });
        }

        let client = self.clients.open_window(target).await?;
        Ok(ClickOutcome::Opened { client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_without_payload() {
        let notification = Notification::from_payload(None);
        assert_eq!(notification.title, NOTIFICATION_TITLE);
        assert_eq!(notification.body, DEFAULT_BODY);
        assert_eq!(notification.vibrate, vec![200, 100, 200]);
        assert_eq!(notification.target_url(), "/index.html");
        let actions: Vec<&str> = notification
            .actions
            .iter()
            .map(|action| action.action.as_str())
            .collect();
        assert_eq!(actions, vec!["view", "dismiss"]);
    }

    #[test]
    fn payload_overrides_body_and_merges_data() {
        let notification = Notification::from_payload(Some(
            br#"{"body":"Due soon","url":"/profile.html","taskId":4}"#,
        ));
        assert_eq!(notification.body, "Due soon");
        assert_eq!(notification.target_url(), "/profile.html");
        assert_eq!(notification.data.get("taskId"), Some(&json!(4)));
        assert!(!notification.data.contains_key("body"));
    }

    #[test]
    fn malformed_payload_falls_back_to_defaults() {
        let notification = Notification::from_payload(Some(b"not json"));
        assert_eq!(notification.body, DEFAULT_BODY);
    }

    #[tokio::test]
    async fn push_then_click_opens_target_when_no_page_matches() {
        let center = NotificationCenter::new();
        let clients = MemoryClients::new();
        let handler = PushHandler::new(&center, &clients);

        let shown = handler
            .on_push(Some(br#"{"body":"Test reminder","url":"/index.html"}"#))
            .await
            .unwrap();
        assert_eq!(shown.body, "Test reminder");
        assert_eq!(shown.target_url(), "/index.html");
        assert_eq!(center.list().len(), 1);

        let outcome = handler.on_click(&shown, None).await.unwrap();
        assert!(matches!(outcome, ClickOutcome::Opened { .. }));
        assert_eq!(clients.opened(), vec!["/index.html".to_string()]);
        assert!(center.list().is_empty());
    }

    #[tokio::test]
    async fn click_focuses_an_open_page_showing_the_target() {
        let center = NotificationCenter::new();
        let clients = MemoryClients::new();
        clients.add("http://localhost:3000/profile.html");
        let page = clients.add("http://localhost:3000/index.html");
        let handler = PushHandler::new(&center, &clients);

        let shown = handler.on_push(None).await.unwrap();
        let outcome = handler.on_click(&shown, Some("view")).await.unwrap();

        assert_eq!(outcome, ClickOutcome::Focused { client: page.clone() });
        assert_eq!(clients.focused(), Some(page.id));
        assert!(clients.opened().is_empty());
    }

    #[tokio::test]
    async fn dismiss_only_closes() {
        let center = NotificationCenter::new();
        let clients = MemoryClients::new();
        let handler = PushHandler::new(&center, &clients);

        let shown = handler.on_push(None).await.unwrap();
        let outcome = handler.on_click(&shown, Some("dismiss")).await.unwrap();

        assert_eq!(outcome, ClickOutcome::Closed);
        assert!(center.list().is_empty());
        assert!(clients.opened().is_empty());
        assert_eq!(clients.focused(), None);
    }
}
