use crate::models::ListingPage;

/// Position in the remote follower listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u64,
    pub anchor_id: u64,
}

impl Cursor {
    pub fn new(offset: u64, anchor_id: u64) -> Self {
        Self { offset, anchor_id }
    }

    /// Move past `page`. An empty page leaves the anchor where it was.
    pub fn advance(&mut self, page: &ListingPage) {
        self.offset += page.len() as u64;
        if let Some(last) = page.last_id() {
            self.anchor_id = last;
        }
    }

    pub fn below(&self, ceiling: u64) -> bool {
        self.offset < ceiling
    }
}
