use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::presenter::{KioskEvent, Presenter};

pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

struct Board {
    current: Option<Notice>,
    next_id: u64,
}

/// Holds the single inline notice and removes it once its time is up.
#[derive(Clone)]
pub struct NoticeBoard {
    board: Arc<Mutex<Board>>,
    expiry: Arc<Mutex<Option<JoinHandle<()>>>>,
    ttl: Duration,
    presenter: Arc<dyn Presenter>,
}

impl NoticeBoard {
    pub fn new(presenter: Arc<dyn Presenter>, ttl: Duration) -> Self {
        Self {
            board: Arc::new(Mutex::new(Board {
                current: None,
                next_id: 1,
            })),
            expiry: Arc::new(Mutex::new(None)),
            ttl,
            presenter,
        }
    }

    pub async fn current(&self) -> Option<Notice> {
        self.board.lock().await.current.clone()
    }

    /// Shows `message`, replacing any visible notice, and returns its id.
    pub async fn show(&self, level: NoticeLevel, message: impl Into<String>) -> u64 {
        let notice = {
            let mut board = self.board.lock().await;
            if let Some(previous) = board.current.take() {
                self.presenter
                    .emit(&KioskEvent::NoticeCleared { id: previous.id });
            }
            let notice = Notice {
                id: board.next_id,
                level,
                message: message.into(),
            };
            board.next_id += 1;
            board.current = Some(notice.clone());
            notice
        };

        self.presenter.emit(&KioskEvent::NoticeShown {
            id: notice.id,
            level: notice.level,
            message: notice.message.clone(),
        });

        let mut expiry = self.expiry.lock().await;
        if let Some(handle) = expiry.take() {
            handle.abort();
        }

        let board = self.board.clone();
        let presenter = self.presenter.clone();
        let ttl = self.ttl;
        let id = notice.id;
        *expiry = Some(tokio::spawn(async move {
            time::sleep(ttl).await;
            clear_if_current(&board, presenter.as_ref(), id).await;
        }));

        id
    }

    /// Removes the visible notice now. Returns false when nothing was shown.
    pub async fn dismiss(&self) -> bool {
        let id = match self.board.lock().await.current.as_ref() {
            Some(notice) => notice.id,
            None => return false,
        };
        if let Some(handle) = self.expiry.lock().await.take() {
            handle.abort();
        }
        clear_if_current(&self.board, self.presenter.as_ref(), id).await
    }
}

async fn clear_if_current(board: &Mutex<Board>, presenter: &dyn Presenter, id: u64) -> bool {
    let mut board = board.lock().await;
    if board.current.as_ref().map(|notice| notice.id) != Some(id) {
        return false;
    }
    board.current = None;
    presenter.emit(&KioskEvent::NoticeCleared { id });
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[derive(Default)]
    struct Events(StdMutex<Vec<KioskEvent>>);

    impl Presenter for Events {
        fn emit(&self, event: &KioskEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn notice_expires_after_ttl() {
        let events = Arc::new(Events::default());
        let board = NoticeBoard::new(events.clone(), DEFAULT_NOTICE_TTL);

        let id = board.show(NoticeLevel::Warning, "Already marked").await;
        time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(board.current().await.map(|n| n.id), Some(id));

        time::sleep(Duration::from_millis(200)).await;
        assert!(board.current().await.is_none());
        assert_eq!(
            events.0.lock().unwrap().last(),
            Some(&KioskEvent::NoticeCleared { id })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn newer_notice_restarts_expiry() {
        let events = Arc::new(Events::default());
        let board = NoticeBoard::new(events.clone(), DEFAULT_NOTICE_TTL);

        board.show(NoticeLevel::Warning, "first").await;
        time::sleep(Duration::from_secs(3)).await;
        let second = board.show(NoticeLevel::Warning, "second").await;
        time::sleep(Duration::from_secs(3)).await;

        let current = board.current().await.unwrap();
        assert_eq!(current.id, second);
        assert_eq!(current.message, "second");

        time::sleep(Duration::from_secs(3)).await;
        assert!(board.current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_removes_notice_immediately() {
        let events = Arc::new(Events::default());
        let board = NoticeBoard::new(events, DEFAULT_NOTICE_TTL);

        assert!(!board.dismiss().await);
        board.show(NoticeLevel::Info, "hello").await;
        assert!(board.dismiss().await);
        assert!(board.current().await.is_none());
    }
}
