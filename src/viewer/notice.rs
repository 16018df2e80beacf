use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-visible message posted by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "{}", self.message),
            NoticeLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Bounded history of notices; the oldest entry is dropped when full.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    notices: VecDeque<Notice>,
    capacity: usize,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NoticeBoard {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            notices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn post(&mut self, level: NoticeLevel, message: impl Into<String>) {
        if self.notices.len() == self.capacity {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.post(NoticeLevel::Error, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.post(NoticeLevel::Info, message);
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.notices
            .iter()
            .filter(|notice| notice.level == NoticeLevel::Error)
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}
