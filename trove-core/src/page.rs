use crate::{Error, Result};

/// Window over a result set: `size` rows starting at row `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    size: u64,
    offset: u64,
}

impl PageRequest {
    /// Zero based page number `page` of `size` rows.
    pub fn of(page: u64, size: u64) -> Result<Self> {
        let offset = page.checked_mul(size).ok_or_else(|| {
            Error::msg(format!("Page {page} of size {size} is out of range"))
        })?;
        Self::at_offset(offset, size)
    }

    pub fn at_offset(offset: u64, size: u64) -> Result<Self> {
        if size == 0 {
            return Err(Error::msg("Page size must be positive"));
        }
        Ok(Self { size, offset })
    }

    pub fn size(&self) -> u64 {
        self.size
    }
    pub fn offset(&self) -> u64 {
        self.offset
    }
    /// Zero based page number, rounded down when the offset is not a multiple of the size.
    pub fn page(&self) -> u64 {
        self.offset / self.size
    }
    pub fn next(&self) -> Self {
        Self {
            size: self.size,
            offset: self.offset.saturating_add(self.size),
        }
    }
}

/// One page of results plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    request: PageRequest,
    total_elements: u64,
    content: Vec<E>,
}

impl<E> Page<E> {
    pub fn new(request: PageRequest, total_elements: u64, content: Vec<E>) -> Self {
        Self {
            request,
            total_elements,
            content,
        }
    }
    pub fn empty(request: PageRequest, total_elements: u64) -> Self {
        Self::new(request, total_elements, Vec::new())
    }
    pub fn request(&self) -> &PageRequest {
        &self.request
    }
    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }
    pub fn content(&self) -> &[E] {
        &self.content
    }
    pub fn into_content(self) -> Vec<E> {
        self.content
    }
    pub fn len(&self) -> usize {
        self.content.len()
    }
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.request.size)
    }
    pub fn has_next(&self) -> bool {
        self.request.offset.saturating_add(self.request.size) < self.total_elements
    }
    pub fn map<T>(self, f: impl FnMut(E) -> T) -> Page<T> {
        Page {
            request: self.request,
            total_elements: self.total_elements,
            content: self.content.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_and_bounds() {
        assert!(PageRequest::of(0, 0).is_err());
        assert!(PageRequest::of(u64::MAX, 2).is_err());
        let request = PageRequest::of(3, 5).unwrap();
        assert_eq!(request.offset(), 15);
        assert_eq!(request.page(), 3);
        assert_eq!(request.next().offset(), 20);
        let page = Page::new(request, 17, vec![1, 2]);
        assert_eq!(page.total_pages(), 4);
        assert!(!page.has_next());
        assert!(!Page::<i32>::empty(request, 20).has_next());
        assert!(Page::<i32>::empty(request, 21).has_next());
        let interior = Page::new(PageRequest::of(1, 5).unwrap(), 17, vec![5, 6, 7, 8, 9]);
        assert!(interior.has_next());
        assert_eq!(interior.request().page(), 1);
        assert_eq!(page.map(|v| v * 10).content(), &[10, 20]);
    }
}
