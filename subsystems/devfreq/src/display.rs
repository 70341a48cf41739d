//! # Display Source
//!
//! Blank/unblank notifications from the display driver. Clients hang off a
//! notifier chain and are called in priority order, highest first; a
//! client can end the walk by returning [`NotifyResult::Stop`].

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::RwLock;

// =============================================================================
// Events
// =============================================================================

/// Point in the blank sequence a notification is sent from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    /// Before the panel changes power state
    EarlyEventBlank,
    /// After the panel changed power state
    EventBlank,
}

/// Requested panel power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankMode {
    /// Panel on
    Unblank,
    /// Panel off
    Powerdown,
    /// Low power mode 1
    Lp1,
    /// Low power mode 2
    Lp2,
}

impl BlankMode {
    /// Whether this mode turns the screen off
    pub const fn is_blank(self) -> bool {
        !matches!(self, BlankMode::Unblank)
    }
}

/// A display power notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayEvent {
    /// When in the sequence this is
    pub action: DisplayAction,
    /// Target power state
    pub blank: BlankMode,
}

/// What a client did with a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyResult {
    /// Not interested
    Done,
    /// Handled
    Ok,
    /// Handled, do not call lower priority clients
    Stop,
}

// =============================================================================
// Clients & Chains
// =============================================================================

/// Receiver of display notifications
pub trait DisplayClient: Send + Sync {
    /// Client name
    fn name(&self) -> &str;

    /// Handle one notification
    fn notify(&self, event: &DisplayEvent) -> NotifyResult;
}

/// Registration interface of a display notifier chain
pub trait DisplayNotifierChain: Send + Sync {
    /// Add `client`; higher `priority` is called earlier. Errors are
    /// negative errno values.
    fn register_client(&self, client: Arc<dyn DisplayClient>, priority: i32) -> Result<(), i32>;

    /// Remove `client`
    fn unregister_client(&self, client: &Arc<dyn DisplayClient>);
}

struct ChainEntry {
    priority: i32,
    client: Arc<dyn DisplayClient>,
}

/// Priority-ordered notifier chain
pub struct NotifierChain {
    clients: RwLock<Vec<ChainEntry>>,
    notifications: AtomicU64,
}

impl NotifierChain {
    /// Empty chain
    pub const fn new() -> Self {
        Self {
            clients: RwLock::new(Vec::new()),
            notifications: AtomicU64::new(0),
        }
    }

    /// Call every client in priority order until one returns `Stop`.
    ///
    /// Returns the result of the last client called, or `Done` when the
    /// chain is empty.
    pub fn notify(&self, event: &DisplayEvent) -> NotifyResult {
        self.notifications.fetch_add(1, Ordering::Relaxed);

        let clients = self.clients.read();
        let mut result = NotifyResult::Done;
        for entry in clients.iter() {
            result = entry.client.notify(event);
            if result == NotifyResult::Stop {
                log::trace!("DisplayNotifier: {} stopped the chain", entry.client.name());
                break;
            }
        }
        result
    }

    /// Registered client count
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether no client is registered
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Notifications sent so far
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }
}

impl Default for NotifierChain {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayNotifierChain for NotifierChain {
    fn register_client(&self, client: Arc<dyn DisplayClient>, priority: i32) -> Result<(), i32> {
        let mut clients = self.clients.write();

        // Equal priorities keep registration order
        let pos = clients
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(clients.len());
        log::debug!("DisplayNotifier: registered {} at priority {}", client.name(), priority);
        clients.insert(pos, ChainEntry { priority, client });
        Ok(())
    }

    fn unregister_client(&self, client: &Arc<dyn DisplayClient>) {
        let mut clients = self.clients.write();
        if let Some(pos) = clients.iter().position(|e| Arc::ptr_eq(&e.client, client)) {
            clients.remove(pos);
            log::debug!("DisplayNotifier: removed {}", client.name());
        }
    }
}

impl core::fmt::Debug for NotifierChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NotifierChain")
            .field("clients", &self.len())
            .field("notifications", &self.notifications())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use spin::Mutex;

    struct Recorder {
        name: &'static str,
        result: NotifyResult,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl DisplayClient for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn notify(&self, _event: &DisplayEvent) -> NotifyResult {
            self.log.lock().push(String::from(self.name));
            self.result
        }
    }

    fn client(name: &'static str, result: NotifyResult, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn DisplayClient> {
        Arc::new(Recorder {
            name,
            result,
            log: log.clone(),
        })
    }

    const BLANK: DisplayEvent = DisplayEvent {
        action: DisplayAction::EarlyEventBlank,
        blank: BlankMode::Powerdown,
    };

    #[test]
    fn test_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = NotifierChain::new();
        chain.register_client(client("low", NotifyResult::Ok, &log), 0).unwrap();
        chain.register_client(client("high", NotifyResult::Ok, &log), i32::MAX).unwrap();
        chain.register_client(client("mid", NotifyResult::Ok, &log), 10).unwrap();

        assert_eq!(chain.notify(&BLANK), NotifyResult::Ok);
        assert_eq!(*log.lock(), ["high", "mid", "low"]);
    }

    #[test]
    fn test_stop_ends_walk() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = NotifierChain::new();
        chain.register_client(client("first", NotifyResult::Stop, &log), 5).unwrap();
        chain.register_client(client("second", NotifyResult::Ok, &log), 1).unwrap();

        assert_eq!(chain.notify(&BLANK), NotifyResult::Stop);
        assert_eq!(*log.lock(), ["first"]);
    }

    #[test]
    fn test_unregister() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = NotifierChain::new();
        let c = client("c", NotifyResult::Ok, &log);
        chain.register_client(c.clone(), 0).unwrap();
        assert_eq!(chain.len(), 1);

        chain.unregister_client(&c);
        assert!(chain.is_empty());
        assert_eq!(chain.notify(&BLANK), NotifyResult::Done);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_blank_modes() {
        assert!(!BlankMode::Unblank.is_blank());
        assert!(BlankMode::Powerdown.is_blank());
        assert!(BlankMode::Lp1.is_blank());
    }
}
