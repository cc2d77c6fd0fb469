use crate::backends::{VoiceError, VoiceFactory};
use crate::readers::{Reader, ReaderError};
use std::path::PathBuf;

/// Tracks which page of a user's document comes next.
#[derive(Debug)]
pub struct PageCursor {
    reader: Reader,
    page: usize,
}

impl PageCursor {
    pub fn new(reader: Reader, page: usize) -> Self {
        Self { reader, page }
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    /// Moves the cursor without checking the page exists.
    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    /// Renders the next readable page and moves past it.
    ///
    /// Returns `Ok(None)` once the document is exhausted; the cursor is then
    /// spent and callers should go back to the menu rather than retry.
    pub fn advance(&mut self) -> Result<Option<PathBuf>, ReaderError> {
        let next = self.reader.pages_from(self.page).next();
        match next {
            None => {
                tracing::debug!(page = self.page, "document exhausted");
                Ok(None)
            }
            Some(page) => {
                let page = page?;
                let path = self.reader.render_page(&page)?;
                self.page = page.index + 1;
                Ok(Some(path))
            }
        }
    }

    /// Renders page `page` directly and continues reading after it.
    pub fn jump_to(&mut self, page: usize) -> Result<PathBuf, ReaderError> {
        let path = self.reader.page_at(page)?;
        self.page = page + 1;
        Ok(path)
    }

    pub fn switch_voice(&mut self, name: &str, factory: &VoiceFactory) -> Result<(), VoiceError> {
        self.reader.set_voice(name, factory)
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }
}
